//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitor status as reported by Uptime Kuma.
///
/// Codes outside the four known values are kept as `Unknown` so they survive a
/// store round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MonitorStatus {
    Down,
    Up,
    Pending,
    Maintenance,
    Unknown(i64),
}

impl MonitorStatus {
    pub fn code(self) -> i64 {
        match self {
            MonitorStatus::Down => 0,
            MonitorStatus::Up => 1,
            MonitorStatus::Pending => 2,
            MonitorStatus::Maintenance => 3,
            MonitorStatus::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MonitorStatus::Down => "DOWN",
            MonitorStatus::Up => "UP",
            MonitorStatus::Pending => "PENDING",
            MonitorStatus::Maintenance => "MAINTENANCE",
            MonitorStatus::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<i64> for MonitorStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => MonitorStatus::Down,
            1 => MonitorStatus::Up,
            2 => MonitorStatus::Pending,
            3 => MonitorStatus::Maintenance,
            other => MonitorStatus::Unknown(other),
        }
    }
}

impl From<MonitorStatus> for i64 {
    fn from(status: MonitorStatus) -> Self {
        status.code()
    }
}

/// One reading for one monitor at one fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub id: i64,
    pub monitor_name: String,
    pub monitor_type: Option<String>,
    pub monitor_url: String,
    pub monitor_hostname: Option<String>,
    pub monitor_port: Option<String>,
    pub cert_days_remaining: Option<i64>,
    pub cert_is_valid: Option<bool>,
    pub response_time_ms: Option<i64>,
    pub status: Option<MonitorStatus>,
    pub fetched_at: DateTime<Utc>,
}

impl MetricSample {
    pub fn is_status(&self, status: MonitorStatus) -> bool {
        self.status == Some(status)
    }
}

impl Default for MetricSample {
    fn default() -> Self {
        Self {
            id: 0,
            monitor_name: "unknown".to_string(),
            monitor_type: None,
            monitor_url: "unknown".to_string(),
            monitor_hostname: None,
            monitor_port: None,
            cert_days_remaining: None,
            cert_is_valid: None,
            response_time_ms: None,
            status: None,
            fetched_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Optional bounds applied to every history query.
///
/// Both time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub monitor_url: Option<String>,
}

impl SampleFilter {
    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
            monitor_url: None,
        }
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Default::default()
        }
    }

    pub fn for_monitor(mut self, monitor_url: impl Into<String>) -> Self {
        self.monitor_url = Some(monitor_url.into());
        self
    }

    pub fn matches(&self, sample: &MetricSample) -> bool {
        if let Some(since) = self.since {
            if sample.fetched_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if sample.fetched_at > until {
                return false;
            }
        }
        match &self.monitor_url {
            Some(url) => &sample.monitor_url == url,
            None => true,
        }
    }
}
