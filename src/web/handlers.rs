//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, MetricSample, SampleFilter, Store};
use crate::report::{
    build_dataset, dashboard_overview, reports_overview, Bucket, Dataset, DatasetRows, Range,
    ReportFilters, SeriesAggregator, SortDirection, MIN_DOWNTIME_MINUTES,
};
use crate::scheduler::CycleError;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Latest samples plus the history inside `filter`.
fn load_window(store: &Store, filter: &SampleFilter) -> Result<(Vec<MetricSample>, SeriesAggregator), DbError> {
    let latest = store.latest_per_monitor()?;
    let history = SeriesAggregator::new(store.get_samples(filter)?);
    tracing::debug!("Loaded {} monitors for query window", latest.len());
    Ok((latest, history))
}

fn store_error(e: DbError) -> Response {
    tracing::error!("Store query failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// A missing or empty bucket means minute buckets.
fn parse_bucket(value: Option<&str>) -> Result<Bucket, Response> {
    match value.map(str::trim) {
        None | Some("") => Ok(Bucket::default()),
        Some(s) => s
            .parse()
            .map_err(|e: String| (StatusCode::BAD_REQUEST, e).into_response()),
    }
}

fn parse_time(value: Option<&String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_date(value: Option<&String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub range: Option<String>,
}

pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let since = Range::parse(query.range.as_deref()).since(Utc::now());

    match load_window(&state.store, &SampleFilter::since(since)) {
        Ok((latest, history)) => Json(dashboard_overview(&latest, &history, since)).into_response(),
        Err(e) => store_error(e),
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
}

pub async fn handle_reports_overview(
    State(state): State<AppState>,
    Query(query): Query<ReportsQuery>,
) -> impl IntoResponse {
    let bucket = match parse_bucket(query.bucket.as_deref()) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let filters = ReportFilters::resolve(
        parse_date(query.start.as_ref()),
        parse_date(query.end.as_ref()),
        bucket,
        Utc::now(),
    );

    match load_window(&state.store, &filters.sample_filter()) {
        Ok((latest, history)) => Json(reports_overview(&latest, &history, filters)).into_response(),
        Err(e) => store_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DatasetQuery {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub dataset: String,
    pub range: Range,
    pub bucket: Bucket,
    pub since: DateTime<Utc>,
    pub rows: DatasetRows,
}

pub async fn handle_dataset(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DatasetQuery>,
) -> impl IntoResponse {
    let dataset: Dataset = match name.parse() {
        Ok(d) => d,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };
    let bucket = match parse_bucket(query.bucket.as_deref()) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let direction = query
        .direction
        .as_deref()
        .map_or(SortDirection::Desc, SortDirection::parse);
    let range = Range::parse(query.range.as_deref());
    let since = range.since(Utc::now());
    let filter = SampleFilter::since(since);

    let (latest, history) = match load_window(&state.store, &filter) {
        Ok(loaded) => loaded,
        Err(e) => return store_error(e),
    };

    let rows = build_dataset(dataset, &latest, &history, &filter, bucket, direction);
    tracing::debug!("Dataset {} has {} rows", name, rows.len());

    Json(DatasetResponse {
        dataset: name,
        range,
        bucket,
        since,
        rows,
    })
    .into_response()
}

// ============================================================================
// API: Downtime
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DowntimeQuery {
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub until: Option<String>,
    #[serde(default)]
    pub monitor_url: Option<String>,
    #[serde(default)]
    pub min_minutes: Option<i64>,
}

pub async fn handle_downtime(
    State(state): State<AppState>,
    Query(query): Query<DowntimeQuery>,
) -> impl IntoResponse {
    let until = parse_time(query.until.as_ref()).unwrap_or_else(Utc::now);
    let since = parse_time(query.since.as_ref()).unwrap_or_else(|| until - ChronoDuration::hours(24));

    let mut filter = SampleFilter::between(since, until);
    if let Some(url) = query.monitor_url.filter(|u| !u.is_empty()) {
        filter = filter.for_monitor(url);
    }

    match state.store.get_samples(&filter) {
        Ok(samples) => {
            let history = SeriesAggregator::new(samples);
            let min_minutes = query.min_minutes.unwrap_or(MIN_DOWNTIME_MINUTES);
            Json(history.downtime_windows(&filter, min_minutes)).into_response()
        }
        Err(e) => store_error(e),
    }
}

// ============================================================================
// API: Fetch
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    pub base_url: Option<String>,
}

pub async fn handle_fetch(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> impl IntoResponse {
    let base_url = query.base_url.as_deref().filter(|u| !u.is_empty());

    match state.scheduler.run_cycle(base_url).await {
        Ok(report) => Json(report).into_response(),
        Err(CycleError::AlreadyRunning) => {
            (StatusCode::CONFLICT, CycleError::AlreadyRunning.to_string()).into_response()
        }
        Err(e @ CycleError::Fetch(_)) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
        Err(e @ CycleError::Store(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub samples: i64,
    pub monitors: usize,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub kuma_url: String,
    pub fetch_interval_seconds: u64,
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let samples = match state.store.count_samples() {
        Ok(n) => n,
        Err(e) => return store_error(e),
    };
    let latest = match state.store.latest_per_monitor() {
        Ok(rows) => rows,
        Err(e) => return store_error(e),
    };

    Json(StatusResponse {
        samples,
        monitors: latest.len(),
        last_fetched_at: latest.iter().map(|s| s.fetched_at).max(),
        kuma_url: state.config.kuma.base_url.clone(),
        fetch_interval_seconds: state.config.fetch_interval.as_secs(),
    })
    .into_response()
}
