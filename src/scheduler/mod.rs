//! Scheduler module for periodic metric fetch cycles.

use crate::db::{DbError, MetricSample, Store};
use crate::kuma::{FetchError, KumaClient};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("a fetch cycle is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Outcome of one successful fetch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub fetched_at: DateTime<Utc>,
    pub monitors: usize,
}

/// Runs fetch cycles on a fixed interval and on demand.
pub struct Scheduler {
    store: Arc<Store>,
    client: KumaClient,
    interval: Duration,
    running: Mutex<()>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, client: KumaClient, interval: Duration) -> Self {
        Self {
            store,
            client,
            interval,
            running: Mutex::new(()),
        }
    }

    /// Start the periodic loop. Does nothing without a configured base URL.
    pub fn start(self: &Arc<Self>) {
        if self.client.base_url().is_empty() {
            tracing::warn!("UPTIME_KUMA_URL not set, periodic fetching disabled");
            return;
        }

        tracing::info!(
            "Starting scheduler: fetching {} every {:?}",
            self.client.base_url(),
            self.interval
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                // Failures are logged inside run_cycle
                let _ = scheduler.run_cycle(None).await;
            }
        });
    }

    /// Fetch, parse and store one snapshot of every monitor.
    ///
    /// All samples of a cycle share one `fetched_at`. Nothing is written when
    /// the fetch fails.
    pub async fn run_cycle(&self, base_url: Option<&str>) -> Result<CycleReport, CycleError> {
        let _guard = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Skipping fetch cycle, previous cycle still running");
                return Err(CycleError::AlreadyRunning);
            }
        };

        let source = base_url.unwrap_or(self.client.base_url()).to_string();
        match self.fetch_and_store(base_url).await {
            Ok(report) => {
                tracing::info!("Stored {} monitors from {}", report.monitors, source);
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Fetch cycle for {} failed: {}", source, e);
                Err(e)
            }
        }
    }

    async fn fetch_and_store(&self, base_url: Option<&str>) -> Result<CycleReport, CycleError> {
        let parsed = self.client.fetch_and_parse(base_url).await?;
        if parsed.is_empty() {
            tracing::warn!("Metrics response contained no monitors");
        }

        let fetched_at = Utc::now();
        let samples: Vec<MetricSample> = parsed
            .into_records()
            .into_iter()
            .map(|record| record.into_sample(fetched_at))
            .collect();

        self.store.add_samples(&samples)?;

        Ok(CycleReport {
            fetched_at,
            monitors: samples.len(),
        })
    }
}
