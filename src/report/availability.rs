//! Per-monitor availability and response time tables.

use super::{round2, uptime_percent, SeriesAggregator, SortDirection};
use crate::db::{MonitorStatus, SampleFilter};

use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorAvailability {
    pub monitor_url: String,
    pub monitor_name: String,
    pub up_count: usize,
    pub total: usize,
    pub uptime_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorDownCount {
    pub monitor_url: String,
    pub monitor_name: String,
    pub down_count: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeverDownMonitor {
    pub monitor_url: String,
    pub monitor_name: String,
    pub down_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTimeStat {
    pub monitor_url: String,
    pub monitor_name: String,
    pub avg_ms: f64,
    pub max_ms: i64,
    pub total: usize,
}

/// Sample counts by status across a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusTotals {
    pub monitors: usize,
    pub up: usize,
    pub down: usize,
    pub pending: usize,
    pub maintenance: usize,
}

/// Order `None` percentages after every real value regardless of direction.
fn cmp_percent(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => direction.apply(a.total_cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl SeriesAggregator {
    /// Uptime percentage of every monitor with samples in the window.
    ///
    /// Sorted by percentage in `direction`, then by sample count descending.
    pub fn availability_by_monitor(
        &self,
        filter: &SampleFilter,
        direction: SortDirection,
    ) -> Vec<MonitorAvailability> {
        let mut rows: Vec<_> = self
            .monitors(filter)
            .map(|m| {
                let up_count = m.samples.iter().filter(|s| s.is_status(MonitorStatus::Up)).count();
                let total = m.samples.len();
                MonitorAvailability {
                    monitor_url: m.url.to_string(),
                    monitor_name: m.name().to_string(),
                    up_count,
                    total,
                    uptime_percent: uptime_percent(up_count, total),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            cmp_percent(a.uptime_percent, b.uptime_percent, direction)
                .then(b.total.cmp(&a.total))
        });
        rows
    }

    /// [`availability_by_monitor`](Self::availability_by_monitor) limited to the top `limit`.
    pub fn uptime_leaderboard(
        &self,
        filter: &SampleFilter,
        direction: SortDirection,
        limit: usize,
    ) -> Vec<MonitorAvailability> {
        let mut rows = self.availability_by_monitor(filter, direction);
        rows.truncate(limit);
        rows
    }

    /// DOWN sample counts, most down first.
    pub fn most_down(&self, filter: &SampleFilter, limit: usize) -> Vec<MonitorDownCount> {
        let mut rows: Vec<_> = self
            .monitors(filter)
            .map(|m| MonitorDownCount {
                monitor_url: m.url.to_string(),
                monitor_name: m.name().to_string(),
                down_count: m.samples.iter().filter(|s| s.is_status(MonitorStatus::Down)).count(),
                total: m.samples.len(),
            })
            .collect();

        rows.sort_by(|a, b| b.down_count.cmp(&a.down_count).then(b.total.cmp(&a.total)));
        rows.truncate(limit);
        rows
    }

    /// Monitors without a single DOWN sample in the window, ordered by name.
    pub fn never_down(&self, filter: &SampleFilter) -> Vec<NeverDownMonitor> {
        let mut rows: Vec<_> = self
            .monitors(filter)
            .filter(|m| !m.samples.iter().any(|s| s.is_status(MonitorStatus::Down)))
            .map(|m| NeverDownMonitor {
                monitor_url: m.url.to_string(),
                monitor_name: m.name().to_string(),
                down_count: 0,
            })
            .collect();

        rows.sort_by(|a, b| a.monitor_name.cmp(&b.monitor_name));
        rows
    }

    /// Average and maximum response time, ignoring samples without one.
    pub fn response_time_stats(
        &self,
        filter: &SampleFilter,
        direction: SortDirection,
        limit: usize,
    ) -> Vec<ResponseTimeStat> {
        let mut rows: Vec<_> = self
            .monitors(filter)
            .filter_map(|m| {
                let times: Vec<i64> = m.samples.iter().filter_map(|s| s.response_time_ms).collect();
                let max_ms = *times.iter().max()?;
                let sum: i128 = times.iter().map(|&t| i128::from(t)).sum();
                Some(ResponseTimeStat {
                    monitor_url: m.url.to_string(),
                    monitor_name: m.name().to_string(),
                    avg_ms: round2(sum as f64 / times.len() as f64),
                    max_ms,
                    total: times.len(),
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            direction
                .apply(a.avg_ms.total_cmp(&b.avg_ms))
                .then(b.total.cmp(&a.total))
        });
        rows.truncate(limit);
        rows
    }

    /// Status counts over every sample in the window.
    pub fn status_totals(&self, filter: &SampleFilter) -> StatusTotals {
        let mut totals = StatusTotals::default();
        for m in self.monitors(filter) {
            totals.monitors += 1;
            for s in &m.samples {
                match s.status {
                    Some(MonitorStatus::Up) => totals.up += 1,
                    Some(MonitorStatus::Down) => totals.down += 1,
                    Some(MonitorStatus::Pending) => totals.pending += 1,
                    Some(MonitorStatus::Maintenance) => totals.maintenance += 1,
                    _ => {}
                }
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::series::tests::{at, t0};
    use chrono::Duration;

    fn with_rt(url: &str, minutes: i64, rt: Option<i64>) -> crate::db::MetricSample {
        let mut s = at(url, 1, minutes);
        s.response_time_ms = rt;
        s
    }

    #[test]
    fn test_uptime_percent_rounds_to_two_decimals() {
        let samples: Vec<_> = (0..9).map(|i| at("a", if i < 7 { 1 } else { 0 }, i)).collect();
        let agg = SeriesAggregator::new(samples);
        let rows = agg.availability_by_monitor(&SampleFilter::default(), SortDirection::Desc);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].up_count, 7);
        assert_eq!(rows[0].total, 9);
        assert_eq!(rows[0].uptime_percent, Some(77.78));
    }

    #[test]
    fn test_monitor_without_samples_in_window_is_absent() {
        let agg = SeriesAggregator::new(vec![at("a", 1, 0), at("b", 0, 30)]);
        let filter = SampleFilter::since(t0() + Duration::minutes(10));
        let rows = agg.uptime_leaderboard(&filter, SortDirection::Desc, 10);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].monitor_url, "b");
        assert_eq!(rows[0].uptime_percent, Some(0.0));

        let empty = SeriesAggregator::new(Vec::new());
        assert!(empty.uptime_leaderboard(&filter, SortDirection::Asc, 10).is_empty());
    }

    #[test]
    fn test_leaderboard_ordering_and_limit() {
        let mut samples = vec![at("a", 1, 0), at("a", 0, 1)];
        samples.extend((0..4).map(|i| at("b", 1, i)));
        samples.extend((0..2).map(|i| at("c", 1, i)));
        samples.extend((0..4).map(|i| at("d", if i == 0 { 0 } else { 1 }, i)));
        let agg = SeriesAggregator::new(samples);
        let filter = SampleFilter::default();

        let desc: Vec<_> = agg
            .uptime_leaderboard(&filter, SortDirection::Desc, 10)
            .into_iter()
            .map(|r| r.monitor_url)
            .collect();
        // b and c tie at 100%, b has more samples
        assert_eq!(desc, vec!["b", "c", "d", "a"]);

        let asc: Vec<_> = agg
            .uptime_leaderboard(&filter, SortDirection::Asc, 2)
            .into_iter()
            .map(|r| r.monitor_url)
            .collect();
        assert_eq!(asc, vec!["a", "d"]);
    }

    #[test]
    fn test_most_down_and_never_down() {
        let samples = vec![
            at("a", 0, 0),
            at("a", 0, 1),
            at("b", 0, 0),
            at("b", 1, 1),
            at("b", 1, 2),
            at("c", 1, 0),
            at("c", 2, 1),
        ];
        let agg = SeriesAggregator::new(samples);
        let filter = SampleFilter::default();

        let most: Vec<_> = agg
            .most_down(&filter, 10)
            .into_iter()
            .map(|r| (r.monitor_url, r.down_count, r.total))
            .collect();
        assert_eq!(
            most,
            vec![
                ("a".to_string(), 2, 2),
                ("b".to_string(), 1, 3),
                ("c".to_string(), 0, 2)
            ]
        );

        let never = agg.never_down(&filter);
        assert_eq!(never.len(), 1);
        assert_eq!(never[0].monitor_url, "c");
        assert_eq!(never[0].down_count, 0);
    }

    #[test]
    fn test_response_time_stats_skip_missing_values() {
        let samples = vec![
            with_rt("a", 0, Some(100)),
            with_rt("a", 1, Some(201)),
            with_rt("a", 2, None),
            with_rt("b", 0, Some(50)),
            with_rt("c", 0, None),
        ];
        let agg = SeriesAggregator::new(samples);
        let rows = agg.response_time_stats(&SampleFilter::default(), SortDirection::Desc, 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].monitor_url, "a");
        assert_eq!(rows[0].avg_ms, 150.5);
        assert_eq!(rows[0].max_ms, 201);
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[1].monitor_url, "b");

        let asc = agg.response_time_stats(&SampleFilter::default(), SortDirection::Asc, 1);
        assert_eq!(asc[0].monitor_url, "b");
    }

    #[test]
    fn test_response_time_stats_huge_values_do_not_overflow() {
        let samples = vec![
            with_rt("a", 0, Some(9_000_000_000_000_000_000)),
            with_rt("a", 1, Some(9_000_000_000_000_000_000)),
        ];
        let agg = SeriesAggregator::new(samples);
        let rows = agg.response_time_stats(&SampleFilter::default(), SortDirection::Desc, 10);
        assert_eq!(rows[0].max_ms, 9_000_000_000_000_000_000);
        assert_eq!(rows[0].avg_ms, 9e18);
    }

    #[test]
    fn test_status_totals() {
        let agg = SeriesAggregator::new(vec![
            at("a", 1, 0),
            at("a", 0, 1),
            at("b", 3, 0),
            at("b", 2, 1),
            at("b", 8, 2),
        ]);
        let totals = agg.status_totals(&SampleFilter::default());
        assert_eq!(
            totals,
            StatusTotals {
                monitors: 2,
                up: 1,
                down: 1,
                pending: 1,
                maintenance: 1,
            }
        );
    }
}
