//! Queries over the most recent sample of each monitor.

use super::SeriesAggregator;
use crate::db::{MetricSample, MonitorStatus};

use serde::Serialize;
use std::collections::HashMap;

/// Default `cert_days_remaining` threshold for the certificate list.
pub const CERT_DAYS_THRESHOLD: i64 = 30;

/// Monitor counts by current status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub pending: usize,
    pub maintenance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateAttention {
    pub monitor_url: String,
    pub monitor_name: String,
    pub cert_days_remaining: Option<i64>,
    pub cert_is_valid: Option<bool>,
}

/// Pick the newest sample per monitor URL.
///
/// Ties on `fetched_at` go to the highest id. The result is ordered by name,
/// then URL.
pub fn latest_per_monitor<'a>(samples: impl IntoIterator<Item = &'a MetricSample>) -> Vec<MetricSample> {
    let mut latest: HashMap<&str, &MetricSample> = HashMap::new();
    for s in samples {
        latest
            .entry(s.monitor_url.as_str())
            .and_modify(|cur| {
                if (s.fetched_at, s.id) > (cur.fetched_at, cur.id) {
                    *cur = s;
                }
            })
            .or_insert(s);
    }

    let mut rows: Vec<MetricSample> = latest.into_values().cloned().collect();
    rows.sort_by(|a, b| {
        a.monitor_name
            .cmp(&b.monitor_name)
            .then_with(|| a.monitor_url.cmp(&b.monitor_url))
    });
    rows
}

/// Count current statuses. Unknown or missing statuses only add to `total`.
pub fn current_summary(latest: &[MetricSample]) -> StatusSummary {
    let count = |status| latest.iter().filter(|s| s.is_status(status)).count();
    StatusSummary {
        total: latest.len(),
        up: count(MonitorStatus::Up),
        down: count(MonitorStatus::Down),
        pending: count(MonitorStatus::Pending),
        maintenance: count(MonitorStatus::Maintenance),
    }
}

/// Monitors whose certificate expires within `days_threshold` days or is invalid.
pub fn certificates_attention_list(latest: &[MetricSample], days_threshold: i64) -> Vec<CertificateAttention> {
    latest
        .iter()
        .filter(|s| {
            let expiring = s.cert_days_remaining.is_some_and(|d| d <= days_threshold);
            let invalid = s.cert_is_valid == Some(false);
            expiring || invalid
        })
        .map(|s| CertificateAttention {
            monitor_url: s.monitor_url.clone(),
            monitor_name: s.monitor_name.clone(),
            cert_days_remaining: s.cert_days_remaining,
            cert_is_valid: s.cert_is_valid,
        })
        .collect()
}

/// The `limit` slowest monitors by their latest response time.
pub fn slowest_current(latest: &[MetricSample], limit: usize) -> Vec<MetricSample> {
    let mut rows: Vec<MetricSample> = latest
        .iter()
        .filter(|s| s.response_time_ms.is_some())
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.response_time_ms.cmp(&a.response_time_ms));
    rows.truncate(limit);
    rows
}

impl SeriesAggregator {
    /// Newest sample of every monitor held by this aggregator.
    pub fn latest_per_monitor(&self) -> Vec<MetricSample> {
        latest_per_monitor(self.samples(&Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::series::tests::at;

    #[test]
    fn test_latest_per_monitor_picks_newest() {
        let mut tie_lo = at("a", 0, 5);
        tie_lo.id = 4;
        let mut tie_hi = at("a", 2, 5);
        tie_hi.id = 8;
        let samples = vec![at("b", 1, 9), at("a", 1, 0), tie_hi, tie_lo];

        let latest = latest_per_monitor(&samples);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].monitor_url, "a");
        assert_eq!(latest[0].id, 8);
        assert_eq!(latest[0].status, Some(MonitorStatus::Pending));
        assert_eq!(latest[1].monitor_url, "b");

        let agg = SeriesAggregator::new(samples);
        assert_eq!(agg.latest_per_monitor(), latest);
    }

    #[test]
    fn test_current_summary() {
        let latest = vec![at("a", 1, 0), at("b", 1, 0), at("c", 0, 0), at("d", 3, 0), at("e", 5, 0)];
        let summary = current_summary(&latest);
        assert_eq!(
            summary,
            StatusSummary {
                total: 5,
                up: 2,
                down: 1,
                pending: 0,
                maintenance: 1,
            }
        );
        assert_eq!(current_summary(&[]), StatusSummary::default());
    }

    #[test]
    fn test_certificates_attention_list() {
        let mut expiring = at("a", 1, 0);
        expiring.cert_days_remaining = Some(30);
        expiring.cert_is_valid = Some(true);
        let mut invalid = at("b", 1, 0);
        invalid.cert_is_valid = Some(false);
        invalid.cert_days_remaining = Some(200);
        let mut healthy = at("c", 1, 0);
        healthy.cert_days_remaining = Some(31);
        healthy.cert_is_valid = Some(true);
        let mut unknown_days = at("d", 1, 0);
        unknown_days.cert_is_valid = Some(true);

        let latest = vec![expiring, invalid, healthy, unknown_days, at("e", 1, 0)];
        let urls: Vec<_> = certificates_attention_list(&latest, CERT_DAYS_THRESHOLD)
            .into_iter()
            .map(|c| c.monitor_url)
            .collect();
        assert_eq!(urls, vec!["a", "b"]);
    }

    #[test]
    fn test_slowest_current() {
        let mut latest = Vec::new();
        for (url, rt) in [("a", Some(10)), ("b", None), ("c", Some(300)), ("d", Some(42))] {
            let mut s = at(url, 1, 0);
            s.response_time_ms = rt;
            latest.push(s);
        }
        let slowest: Vec<_> = slowest_current(&latest, 2)
            .into_iter()
            .map(|s| s.monitor_url)
            .collect();
        assert_eq!(slowest, vec!["c", "d"]);
    }
}
