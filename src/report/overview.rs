//! Composite views served to the dashboard and report pages.

use super::*;
use crate::db::{MetricSample, MonitorStatus, SampleFilter};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

const REPORT_LIMIT: usize = 10;
const EXPORT_LIMIT: usize = 1000;
const REPORT_MIN_DOWNTIME_MINUTES: i64 = 5;

/// Look-back range of the dashboard and dataset exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Range {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl Range {
    /// Parse a range name; anything unrecognized means 24 hours.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("7d") => Range::Week,
            Some("30d") => Range::Month,
            _ => Range::Day,
        }
    }

    pub fn duration(self) -> ChronoDuration {
        match self {
            Range::Day => ChronoDuration::days(1),
            Range::Week => ChronoDuration::days(7),
            Range::Month => ChronoDuration::days(30),
        }
    }

    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMonitor {
    pub monitor_url: String,
    pub monitor_name: String,
    pub monitor_hostname: Option<String>,
    pub monitor_port: Option<String>,
    pub status: Option<MonitorStatus>,
    pub status_label: &'static str,
    pub response_time_ms: Option<i64>,
    pub uptime_percent: Option<f64>,
    pub cert_days_remaining: Option<i64>,
    pub cert_is_valid: Option<bool>,
    pub fetched_at: DateTime<Utc>,
    pub down_minutes: Option<i64>,
    pub down_start_at: Option<DateTime<Utc>>,
    pub resp_series: Vec<SeriesPoint<f64>>,
}

/// One sparkline point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint<T = usize> {
    pub bucket: DateTime<Utc>,
    pub value: T,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSeries {
    pub up: Vec<SeriesPoint>,
    pub pending: Vec<SeriesPoint>,
    pub down: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub since: DateTime<Utc>,
    pub summary: StatusSummary,
    pub monitors: Vec<DashboardMonitor>,
    pub series: DashboardSeries,
}

/// Build the dashboard view.
///
/// `latest` is the newest sample per monitor; `history` must hold at least the
/// samples since `since`.
pub fn dashboard_overview(
    latest: &[MetricSample],
    history: &SeriesAggregator,
    since: DateTime<Utc>,
) -> DashboardOverview {
    let filter = SampleFilter::since(since);

    let availability: HashMap<String, Option<f64>> = history
        .availability_by_monitor(&filter, SortDirection::Desc)
        .into_iter()
        .map(|a| (a.monitor_url, a.uptime_percent))
        .collect();
    let mut resp_series = history.response_time_series(&filter, Bucket::Minute);

    let monitors = latest
        .iter()
        .map(|row| {
            let (down_minutes, down_start_at) = if row.is_status(MonitorStatus::Down) {
                current_outage(history, &filter, &row.monitor_url)
            } else {
                (None, None)
            };

            DashboardMonitor {
                monitor_url: row.monitor_url.clone(),
                monitor_name: row.monitor_name.clone(),
                monitor_hostname: row.monitor_hostname.clone(),
                monitor_port: row.monitor_port.clone(),
                status: row.status,
                status_label: row.status.map_or("UNKNOWN", MonitorStatus::label),
                response_time_ms: row.response_time_ms,
                uptime_percent: availability.get(&row.monitor_url).copied().flatten(),
                cert_days_remaining: row.cert_days_remaining,
                cert_is_valid: row.cert_is_valid,
                fetched_at: row.fetched_at,
                down_minutes,
                down_start_at,
                resp_series: resp_series
                    .remove(&row.monitor_url)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| SeriesPoint {
                        bucket: b.bucket,
                        value: b.avg_ms,
                    })
                    .collect(),
            }
        })
        .collect();

    let mut series = DashboardSeries::default();
    for b in history.status_series(&filter, Bucket::Minute) {
        series.up.push(SeriesPoint { bucket: b.bucket, value: b.up });
        series.pending.push(SeriesPoint { bucket: b.bucket, value: b.pending });
        series.down.push(SeriesPoint { bucket: b.bucket, value: b.down });
    }

    DashboardOverview {
        since,
        summary: current_summary(latest),
        monitors,
        series,
    }
}

/// Length and start of the most recent downtime window of a monitor.
fn current_outage(
    history: &SeriesAggregator,
    filter: &SampleFilter,
    monitor_url: &str,
) -> (Option<i64>, Option<DateTime<Utc>>) {
    let filter = filter.clone().for_monitor(monitor_url);
    history
        .downtime_windows(&filter, MIN_DOWNTIME_MINUTES)
        .into_iter()
        .max_by_key(|w| w.start_at)
        .map_or((None, None), |w| (Some(w.minutes), Some(w.start_at)))
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFilters {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bucket: Bucket,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl ReportFilters {
    /// Whole days from `start` through `end`; the last 7 days up to `now` by default.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        bucket: Bucket,
        now: DateTime<Utc>,
    ) -> Self {
        let since = start
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_else(|| now - ChronoDuration::days(7));
        let until = end
            .and_then(|d| d.and_hms_nano_opt(23, 59, 59, 999_999_999))
            .map(|dt| dt.and_utc())
            .unwrap_or(now);

        Self {
            start: since.date_naive(),
            end: until.date_naive(),
            bucket,
            since,
            until,
        }
    }

    pub fn sample_filter(&self) -> SampleFilter {
        SampleFilter::between(self.since, self.until)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsOverview {
    pub filters: ReportFilters,
    pub summary: StatusSummary,
    pub status_totals: StatusTotals,
    pub uptime_trend: Vec<UptimeBucket>,
    pub response_time_trend: Vec<ResponseTimeBucket>,
    pub leaderboard: Vec<MonitorAvailability>,
    pub most_down: Vec<MonitorDownCount>,
    pub never_down: Vec<NeverDownMonitor>,
    pub response_stats: Vec<ResponseTimeStat>,
    pub slowest_current: Vec<MetricSample>,
    pub certificates: Vec<CertificateAttention>,
    pub flapping: Vec<FlappingMonitor>,
    pub availability_all: Vec<MonitorAvailability>,
    pub downtime_windows: Vec<DowntimeWindow>,
    pub mttr: Vec<MonitorMttr>,
}

/// Build the reports overview for the window described by `filters`.
pub fn reports_overview(
    latest: &[MetricSample],
    history: &SeriesAggregator,
    filters: ReportFilters,
) -> ReportsOverview {
    let window = filters.sample_filter();
    let bucket = filters.bucket;

    ReportsOverview {
        summary: current_summary(latest),
        status_totals: history.status_totals(&window),
        uptime_trend: history.uptime_trend(&window, bucket),
        response_time_trend: history.response_time_trend(&window, bucket),
        leaderboard: history.uptime_leaderboard(&window, SortDirection::Desc, REPORT_LIMIT),
        most_down: history.most_down(&window, REPORT_LIMIT),
        never_down: history.never_down(&window),
        response_stats: history.response_time_stats(&window, SortDirection::Desc, REPORT_LIMIT),
        slowest_current: slowest_current(latest, REPORT_LIMIT),
        certificates: certificates_attention_list(latest, CERT_DAYS_THRESHOLD),
        flapping: history.flapping_monitors(&window, FLAP_THRESHOLD),
        availability_all: history.availability_by_monitor(&window, SortDirection::Desc),
        downtime_windows: history.downtime_windows(&window, REPORT_MIN_DOWNTIME_MINUTES),
        mttr: history.mttr(&window),
        filters,
    }
}

// ============================================================================
// Datasets
// ============================================================================

/// One report table, exported on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    UptimeTrend,
    ResponseTimeTrend,
    Leaderboard,
    MostDown,
    NeverDown,
    ResponseStats,
    SlowestCurrent,
    Certificates,
    Flapping,
    AvailabilityAll,
    DowntimeWindows,
    Mttr,
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "uptimeTrend" => Dataset::UptimeTrend,
            "responseTimeTrend" => Dataset::ResponseTimeTrend,
            "leaderboard" => Dataset::Leaderboard,
            "mostDown" => Dataset::MostDown,
            "neverDown" => Dataset::NeverDown,
            "responseStats" => Dataset::ResponseStats,
            "slowestCurrent" => Dataset::SlowestCurrent,
            "certificates" => Dataset::Certificates,
            "flapping" => Dataset::Flapping,
            "availabilityAll" => Dataset::AvailabilityAll,
            "downtimeWindows" => Dataset::DowntimeWindows,
            "mttr" => Dataset::Mttr,
            other => return Err(format!("unknown dataset: {}", other)),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DatasetRows {
    UptimeTrend(Vec<UptimeBucket>),
    ResponseTimeTrend(Vec<ResponseTimeBucket>),
    Availability(Vec<MonitorAvailability>),
    MostDown(Vec<MonitorDownCount>),
    NeverDown(Vec<NeverDownMonitor>),
    ResponseStats(Vec<ResponseTimeStat>),
    Samples(Vec<MetricSample>),
    Certificates(Vec<CertificateAttention>),
    Flapping(Vec<FlappingMonitor>),
    DowntimeWindows(Vec<DowntimeWindow>),
    Mttr(Vec<MonitorMttr>),
}

impl DatasetRows {
    pub fn len(&self) -> usize {
        match self {
            DatasetRows::UptimeTrend(rows) => rows.len(),
            DatasetRows::ResponseTimeTrend(rows) => rows.len(),
            DatasetRows::Availability(rows) => rows.len(),
            DatasetRows::MostDown(rows) => rows.len(),
            DatasetRows::NeverDown(rows) => rows.len(),
            DatasetRows::ResponseStats(rows) => rows.len(),
            DatasetRows::Samples(rows) => rows.len(),
            DatasetRows::Certificates(rows) => rows.len(),
            DatasetRows::Flapping(rows) => rows.len(),
            DatasetRows::DowntimeWindows(rows) => rows.len(),
            DatasetRows::Mttr(rows) => rows.len(),
        }
    }
}

/// Compute a single dataset for export.
///
/// `direction` orders the ranked datasets (leaderboard, response stats and
/// full availability); the others keep their fixed order.
pub fn build_dataset(
    dataset: Dataset,
    latest: &[MetricSample],
    history: &SeriesAggregator,
    filter: &SampleFilter,
    bucket: Bucket,
    direction: SortDirection,
) -> DatasetRows {
    match dataset {
        Dataset::UptimeTrend => DatasetRows::UptimeTrend(history.uptime_trend(filter, bucket)),
        Dataset::ResponseTimeTrend => {
            DatasetRows::ResponseTimeTrend(history.response_time_trend(filter, bucket))
        }
        Dataset::Leaderboard => {
            DatasetRows::Availability(history.uptime_leaderboard(filter, direction, EXPORT_LIMIT))
        }
        Dataset::MostDown => DatasetRows::MostDown(history.most_down(filter, EXPORT_LIMIT)),
        Dataset::NeverDown => DatasetRows::NeverDown(history.never_down(filter)),
        Dataset::ResponseStats => {
            DatasetRows::ResponseStats(history.response_time_stats(filter, direction, EXPORT_LIMIT))
        }
        Dataset::SlowestCurrent => DatasetRows::Samples(slowest_current(latest, EXPORT_LIMIT)),
        Dataset::Certificates => {
            DatasetRows::Certificates(certificates_attention_list(latest, CERT_DAYS_THRESHOLD))
        }
        Dataset::Flapping => DatasetRows::Flapping(history.flapping_monitors(filter, FLAP_THRESHOLD)),
        Dataset::AvailabilityAll => {
            DatasetRows::Availability(history.availability_by_monitor(filter, direction))
        }
        Dataset::DowntimeWindows => DatasetRows::DowntimeWindows(
            history.downtime_windows(filter, REPORT_MIN_DOWNTIME_MINUTES),
        ),
        Dataset::Mttr => DatasetRows::Mttr(history.mttr(filter)),
    }
}
