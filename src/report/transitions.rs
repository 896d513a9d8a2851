//! Status transition scans: flapping, downtime windows and MTTR.
//!
//! Each monitor's samples are folded independently in time order; no state is
//! shared between monitors.

use super::series::MonitorSeries;
use super::SeriesAggregator;
use crate::db::{MonitorStatus, SampleFilter};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default minimum flip count for [`SeriesAggregator::flapping_monitors`].
pub const FLAP_THRESHOLD: usize = 3;

/// Default minimum window length for [`SeriesAggregator::downtime_windows`].
pub const MIN_DOWNTIME_MINUTES: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlappingMonitor {
    pub monitor_url: String,
    pub monitor_name: String,
    pub flips: usize,
}

/// A contiguous run of DOWN samples for one monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DowntimeWindow {
    pub monitor_url: String,
    pub monitor_name: String,
    pub start_at: DateTime<Utc>,
    /// Time of the recovering sample, or of the last sample seen while still down.
    pub end_at: DateTime<Utc>,
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorMttr {
    pub monitor_url: String,
    pub monitor_name: String,
    pub mttr_minutes: i64,
}

fn count_flips(series: &MonitorSeries<'_>) -> usize {
    series
        .samples
        .windows(2)
        .filter(|pair| pair[0].status != pair[1].status)
        .count()
}

fn window_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let secs = (end.timestamp() - start.timestamp()) as f64;
    ((secs / 60.0).round() as i64).max(0)
}

fn scan_downtime(series: &MonitorSeries<'_>, min_minutes: i64) -> Vec<DowntimeWindow> {
    let name = series.name();
    let make = |start_at: DateTime<Utc>, end_at: DateTime<Utc>| DowntimeWindow {
        monitor_url: series.url.to_string(),
        monitor_name: name.to_string(),
        start_at,
        end_at,
        minutes: window_minutes(start_at, end_at),
    };

    let mut windows = Vec::new();
    let mut open: Option<DateTime<Utc>> = None;

    for s in &series.samples {
        let down = s.is_status(MonitorStatus::Down);
        match (open, down) {
            (None, true) => open = Some(s.fetched_at),
            (Some(start), false) => {
                windows.push(make(start, s.fetched_at));
                open = None;
            }
            _ => {}
        }
    }

    // Still down at the end: close provisionally at the last observed time.
    if let (Some(start), Some(last)) = (open, series.samples.last()) {
        windows.push(make(start, last.fetched_at));
    }

    windows.retain(|w| w.minutes >= min_minutes);
    windows
}

impl SeriesAggregator {
    /// Monitors whose status changed at least `threshold` times, most flips first.
    pub fn flapping_monitors(&self, filter: &SampleFilter, threshold: usize) -> Vec<FlappingMonitor> {
        let mut rows: Vec<_> = self
            .monitors(filter)
            .map(|m| FlappingMonitor {
                monitor_url: m.url.to_string(),
                monitor_name: m.name().to_string(),
                flips: count_flips(&m),
            })
            .filter(|f| f.flips >= threshold)
            .collect();

        rows.sort_by(|a, b| b.flips.cmp(&a.flips));
        rows
    }

    /// Downtime windows of at least `min_minutes`, longest first.
    pub fn downtime_windows(&self, filter: &SampleFilter, min_minutes: i64) -> Vec<DowntimeWindow> {
        let mut windows: Vec<_> = self
            .monitors(filter)
            .flat_map(|m| scan_downtime(&m, min_minutes))
            .collect();

        windows.sort_by(|a, b| b.minutes.cmp(&a.minutes));
        windows
    }

    /// Mean time to recovery per monitor, fastest first.
    pub fn mttr(&self, filter: &SampleFilter) -> Vec<MonitorMttr> {
        let mut grouped: BTreeMap<String, Vec<DowntimeWindow>> = BTreeMap::new();
        for w in self.downtime_windows(filter, MIN_DOWNTIME_MINUTES) {
            grouped.entry(w.monitor_url.clone()).or_default().push(w);
        }

        let mut rows: Vec<_> = grouped
            .into_iter()
            .map(|(monitor_url, windows)| {
                let total: i64 = windows.iter().map(|w| w.minutes).sum();
                let mean = total as f64 / windows.len() as f64;
                MonitorMttr {
                    monitor_name: windows[0].monitor_name.clone(),
                    monitor_url,
                    mttr_minutes: mean.round() as i64,
                }
            })
            .collect();

        rows.sort_by(|a, b| a.mttr_minutes.cmp(&b.mttr_minutes));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::series::tests::{at, t0};
    use chrono::Duration;

    const UP: i64 = 1;
    const DOWN: i64 = 0;

    #[test]
    fn test_single_window_ends_at_recovery() {
        let agg = SeriesAggregator::new(vec![
            at("a", UP, 0),
            at("a", DOWN, 3),
            at("a", DOWN, 6),
            at("a", UP, 10),
        ]);
        let windows = agg.downtime_windows(&SampleFilter::default(), MIN_DOWNTIME_MINUTES);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_at, t0() + Duration::minutes(3));
        assert_eq!(windows[0].end_at, t0() + Duration::minutes(10));
        assert_eq!(windows[0].minutes, 7);
    }

    #[test]
    fn test_open_window_closes_at_last_sample() {
        let agg = SeriesAggregator::new(vec![at("a", UP, 0), at("a", DOWN, 1)]);
        let windows = agg.downtime_windows(&SampleFilter::default(), 0);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_at, t0() + Duration::minutes(1));
        assert_eq!(windows[0].end_at, t0() + Duration::minutes(1));
        assert_eq!(windows[0].minutes, 0);

        // The same zero-length window is below the default minimum.
        assert!(agg
            .downtime_windows(&SampleFilter::default(), MIN_DOWNTIME_MINUTES)
            .is_empty());
    }

    #[test]
    fn test_open_window_reports_provisional_length() {
        let agg = SeriesAggregator::new(vec![at("a", DOWN, 0), at("a", DOWN, 4), at("a", DOWN, 9)]);
        let windows = agg.downtime_windows(&SampleFilter::default(), MIN_DOWNTIME_MINUTES);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_at, t0());
        assert_eq!(windows[0].end_at, t0() + Duration::minutes(9));
        assert_eq!(windows[0].minutes, 9);
    }

    #[test]
    fn test_windows_filtered_and_sorted_across_monitors() {
        let mut samples = vec![
            at("a", DOWN, 0),
            at("a", UP, 2),
            at("a", DOWN, 10),
            at("a", 2, 30),
            at("b", DOWN, 0),
            at("b", UP, 12),
        ];
        // a missing status counts as recovery
        let mut no_status = at("c", UP, 20);
        no_status.status = None;
        samples.push(at("c", DOWN, 14));
        samples.push(no_status);

        let agg = SeriesAggregator::new(samples);
        let all: Vec<_> = agg
            .downtime_windows(&SampleFilter::default(), MIN_DOWNTIME_MINUTES)
            .into_iter()
            .map(|w| (w.monitor_url, w.minutes))
            .collect();
        assert_eq!(
            all,
            vec![
                ("a".to_string(), 20),
                ("b".to_string(), 12),
                ("c".to_string(), 6),
                ("a".to_string(), 2),
            ]
        );

        let long = agg.downtime_windows(&SampleFilter::default(), 5);
        assert_eq!(long.len(), 3);

        let only_b = SampleFilter::default().for_monitor("b");
        assert_eq!(agg.downtime_windows(&only_b, 1).len(), 1);
    }

    #[test]
    fn test_window_minutes_round_half_up() {
        let start = t0();
        assert_eq!(window_minutes(start, start + Duration::seconds(89)), 1);
        assert_eq!(window_minutes(start, start + Duration::seconds(90)), 2);
        assert_eq!(window_minutes(start, start - Duration::seconds(90)), 0);
    }

    #[test]
    fn test_flapping_threshold() {
        let samples: Vec<_> = [UP, DOWN, UP, DOWN, UP]
            .iter()
            .enumerate()
            .map(|(i, &status)| at("a", status, i as i64))
            .collect();
        let agg = SeriesAggregator::new(samples);

        let flapping = agg.flapping_monitors(&SampleFilter::default(), FLAP_THRESHOLD);
        assert_eq!(flapping.len(), 1);
        assert_eq!(flapping[0].flips, 4);

        assert!(agg.flapping_monitors(&SampleFilter::default(), 5).is_empty());
    }

    #[test]
    fn test_first_sample_never_flips() {
        let agg = SeriesAggregator::new(vec![at("a", DOWN, 0), at("b", UP, 0), at("b", UP, 1)]);
        let flapping = agg.flapping_monitors(&SampleFilter::default(), 0);
        assert_eq!(flapping.len(), 2);
        assert!(flapping.iter().all(|f| f.flips == 0));
    }

    #[test]
    fn test_flapping_sorted_descending() {
        let mut samples = Vec::new();
        for (i, status) in [UP, DOWN, UP, DOWN].iter().enumerate() {
            samples.push(at("a", *status, i as i64));
        }
        for (i, status) in [UP, DOWN, 2, 3, UP, DOWN].iter().enumerate() {
            samples.push(at("b", *status, i as i64));
        }
        let agg = SeriesAggregator::new(samples);
        let flips: Vec<_> = agg
            .flapping_monitors(&SampleFilter::default(), 1)
            .into_iter()
            .map(|f| (f.monitor_url, f.flips))
            .collect();
        assert_eq!(flips, vec![("b".to_string(), 5), ("a".to_string(), 3)]);
    }

    #[test]
    fn test_mttr_averages_and_sorts() {
        let agg = SeriesAggregator::new(vec![
            at("a", DOWN, 0),
            at("a", UP, 10),
            at("a", DOWN, 20),
            at("a", UP, 25),
            at("b", DOWN, 0),
            at("b", UP, 3),
            at("c", UP, 0),
        ]);
        let mttr = agg.mttr(&SampleFilter::default());
        let rows: Vec<_> = mttr
            .iter()
            .map(|m| (m.monitor_url.as_str(), m.mttr_minutes))
            .collect();
        // a: (10 + 5) / 2 = 7.5 rounds to 8
        assert_eq!(rows, vec![("b", 3), ("a", 8)]);
        assert_eq!(mttr[0].monitor_name, "B");
    }
}
