//! Time-bucketed trend queries.

use super::{round2, truncate_to_bucket, uptime_percent, Bucket, SeriesAggregator};
use crate::db::{MetricSample, MonitorStatus, SampleFilter};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeBucket {
    pub bucket: DateTime<Utc>,
    pub up_count: usize,
    pub total: usize,
    pub uptime_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTimeBucket {
    pub bucket: DateTime<Utc>,
    pub avg_ms: f64,
}

/// Status counts of one bucket, for the dashboard sparklines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBucket {
    pub bucket: DateTime<Utc>,
    pub up: usize,
    pub pending: usize,
    pub down: usize,
}

fn average_by_bucket<'a>(
    samples: impl Iterator<Item = &'a MetricSample>,
    bucket: Bucket,
) -> Vec<ResponseTimeBucket> {
    let mut acc: BTreeMap<DateTime<Utc>, (i128, usize)> = BTreeMap::new();
    for s in samples {
        if let Some(rt) = s.response_time_ms {
            let entry = acc.entry(truncate_to_bucket(s.fetched_at, bucket)).or_default();
            entry.0 += i128::from(rt);
            entry.1 += 1;
        }
    }

    acc.into_iter()
        .map(|(bucket, (sum, count))| ResponseTimeBucket {
            bucket,
            avg_ms: round2(sum as f64 / count as f64),
        })
        .collect()
}

impl SeriesAggregator {
    /// UP count, total and uptime percentage per bucket, ascending.
    pub fn uptime_trend(&self, filter: &SampleFilter, bucket: Bucket) -> Vec<UptimeBucket> {
        let mut acc: BTreeMap<DateTime<Utc>, (usize, usize)> = BTreeMap::new();
        for s in self.samples(filter) {
            let entry = acc.entry(truncate_to_bucket(s.fetched_at, bucket)).or_default();
            if s.is_status(MonitorStatus::Up) {
                entry.0 += 1;
            }
            entry.1 += 1;
        }

        acc.into_iter()
            .map(|(bucket, (up_count, total))| UptimeBucket {
                bucket,
                up_count,
                total,
                uptime_percent: uptime_percent(up_count, total),
            })
            .collect()
    }

    /// Average response time per bucket, ascending. Buckets with no response
    /// times are left out.
    pub fn response_time_trend(&self, filter: &SampleFilter, bucket: Bucket) -> Vec<ResponseTimeBucket> {
        average_by_bucket(self.samples(filter), bucket)
    }

    /// Per monitor URL, average response time per bucket.
    pub fn response_time_series(
        &self,
        filter: &SampleFilter,
        bucket: Bucket,
    ) -> BTreeMap<String, Vec<ResponseTimeBucket>> {
        self.monitors(filter)
            .map(|m| (m.url.to_string(), average_by_bucket(m.samples.into_iter(), bucket)))
            .filter(|(_, series)| !series.is_empty())
            .collect()
    }

    /// UP, PENDING and DOWN counts per bucket, ascending.
    pub fn status_series(&self, filter: &SampleFilter, bucket: Bucket) -> Vec<StatusBucket> {
        let mut acc: BTreeMap<DateTime<Utc>, StatusBucket> = BTreeMap::new();
        for s in self.samples(filter) {
            let key = truncate_to_bucket(s.fetched_at, bucket);
            let entry = acc.entry(key).or_insert_with(|| StatusBucket {
                bucket: key,
                ..Default::default()
            });
            match s.status {
                Some(MonitorStatus::Up) => entry.up += 1,
                Some(MonitorStatus::Pending) => entry.pending += 1,
                Some(MonitorStatus::Down) => entry.down += 1,
                _ => {}
            }
        }
        acc.into_values().collect()
    }
}
