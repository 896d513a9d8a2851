//! Parser for the Uptime Kuma Prometheus exposition text.
//!
//! Only the four `monitor_*` gauges are understood. Every other line, including
//! malformed ones, is skipped without error.

use crate::db::{MetricSample, MonitorStatus};

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// One of the per-monitor gauges exported by Uptime Kuma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    CertDaysRemaining,
    CertIsValid,
    ResponseTime,
    Status,
}

impl MetricKind {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "cert_days_remaining" => Some(MetricKind::CertDaysRemaining),
            "cert_is_valid" => Some(MetricKind::CertIsValid),
            "response_time" => Some(MetricKind::ResponseTime),
            "status" => Some(MetricKind::Status),
            _ => None,
        }
    }
}

/// A partially filled monitor record, as read from one exposition text.
///
/// Metric values are kept as the raw strings from the text; use
/// [`MonitorRecord::into_sample`] to coerce them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorRecord {
    pub monitor_name: Option<String>,
    pub monitor_type: Option<String>,
    pub monitor_url: Option<String>,
    pub monitor_hostname: Option<String>,
    pub monitor_port: Option<String>,
    pub cert_days_remaining: Option<String>,
    pub cert_is_valid: Option<String>,
    pub response_time: Option<String>,
    pub status: Option<String>,
}

impl MonitorRecord {
    fn from_labels(labels: &HashMap<String, String>) -> Self {
        Self {
            monitor_name: labels.get("monitor_name").cloned(),
            monitor_type: labels.get("monitor_type").cloned(),
            monitor_url: labels.get("monitor_url").cloned(),
            monitor_hostname: nullify(labels.get("monitor_hostname")),
            monitor_port: nullify(labels.get("monitor_port")),
            ..Default::default()
        }
    }

    fn set(&mut self, kind: MetricKind, value: &str) {
        let slot = match kind {
            MetricKind::CertDaysRemaining => &mut self.cert_days_remaining,
            MetricKind::CertIsValid => &mut self.cert_is_valid,
            MetricKind::ResponseTime => &mut self.response_time,
            MetricKind::Status => &mut self.status,
        };
        *slot = Some(value.to_string());
    }

    /// Coerce the raw values into a storable sample stamped with `fetched_at`.
    pub fn into_sample(self, fetched_at: DateTime<Utc>) -> MetricSample {
        MetricSample {
            id: 0,
            monitor_name: self.monitor_name.unwrap_or_else(|| "unknown".to_string()),
            monitor_type: self.monitor_type,
            monitor_url: self.monitor_url.unwrap_or_else(|| "unknown".to_string()),
            monitor_hostname: self.monitor_hostname,
            monitor_port: self.monitor_port,
            cert_days_remaining: self.cert_days_remaining.as_deref().and_then(coerce_int),
            cert_is_valid: self
                .cert_is_valid
                .as_deref()
                .and_then(coerce_int)
                .map(|v| v == 1),
            // Kuma reports -1 when no response time was measured
            response_time_ms: self
                .response_time
                .as_deref()
                .and_then(coerce_int)
                .filter(|&ms| ms >= 0),
            status: self
                .status
                .as_deref()
                .and_then(coerce_int)
                .map(MonitorStatus::from),
            fetched_at,
        }
    }
}

/// Monitors parsed from one exposition text, keyed by URL and name.
///
/// Iteration follows the order in which each key first appeared.
#[derive(Debug, Default)]
pub struct ParsedMonitors {
    index: HashMap<String, usize>,
    entries: Vec<(String, MonitorRecord)>,
}

impl ParsedMonitors {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MonitorRecord> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MonitorRecord)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn into_records(self) -> Vec<MonitorRecord> {
        self.entries.into_iter().map(|(_, r)| r).collect()
    }

    fn entry(&mut self, key: String, labels: &HashMap<String, String>) -> &mut MonitorRecord {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.index.insert(key.clone(), idx);
                self.entries.push((key, MonitorRecord::from_labels(labels)));
                idx
            }
        };
        &mut self.entries[idx].1
    }
}

/// Key that groups lines of one exposition text into a monitor.
///
/// Note that two monitors sharing a URL but carrying different names produce
/// two entries here, while stored history groups by URL alone.
pub fn group_key(monitor_url: Option<&str>, monitor_name: Option<&str>) -> String {
    format!("{}|{}", monitor_url.unwrap_or(""), monitor_name.unwrap_or(""))
}

/// Parse an exposition text into per-monitor records.
pub fn parse_monitors(text: &str) -> ParsedMonitors {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    let line_re = LINE_RE.get_or_init(|| {
        Regex::new(
            r"^monitor_(cert_days_remaining|cert_is_valid|response_time|status)\{([^}]*)\}\s+([0-9eE+\-.]+)$",
        )
        .unwrap()
    });

    let mut monitors = ParsedMonitors::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(caps) = line_re.captures(line) else {
            continue;
        };
        let Some(kind) = MetricKind::from_suffix(&caps[1]) else {
            continue;
        };

        let labels = parse_labels(&caps[2]);
        let key = group_key(
            labels.get("monitor_url").map(String::as_str),
            labels.get("monitor_name").map(String::as_str),
        );

        monitors.entry(key, &labels).set(kind, &caps[3]);
    }

    monitors
}

/// Scan a `key="value",...` label string.
///
/// A backslash takes the next character literally. Scanning stops at the first
/// malformed pair and keeps what was read before it.
pub fn parse_labels(input: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(' ' | ',')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                key.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if key.is_empty() || chars.next() != Some('=') {
            break;
        }
        if chars.next() != Some('"') {
            break;
        }

        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => value.push(escaped),
                    None => value.push('\\'),
                },
                '"' => break,
                other => value.push(other),
            }
        }
        labels.insert(key, value);

        for c in chars.by_ref() {
            if c == ',' {
                break;
            }
        }
    }

    labels
}

/// Empty and `"null"` label values mean "not set".
fn nullify(value: Option<&String>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(v.to_string())
    }
}

/// Exposition values may be written as floats; truncate toward zero.
fn coerce_int(raw: &str) -> Option<i64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}
