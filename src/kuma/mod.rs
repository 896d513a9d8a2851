//! Uptime Kuma metrics client.
//!
//! Fetches the Prometheus exposition text from `{base_url}/metrics` and parses
//! it into per-monitor records.

mod parser;

pub use parser::*;

use crate::config::KumaConfig;

use std::time::Duration;
use thiserror::Error;

/// Upstream fetch failures. Any of these aborts the current fetch cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("UPTIME_KUMA_URL is not configured")]
    NotConfigured,
    #[error("metrics fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed fetching metrics: HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}

/// HTTP client for one Uptime Kuma instance.
#[derive(Debug, Clone)]
pub struct KumaClient {
    config: KumaConfig,
    http: reqwest::Client,
}

impl KumaClient {
    pub fn new(config: KumaConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Fetch the raw metrics text, optionally from an override base URL.
    pub async fn fetch_metrics_text(&self, base_url: Option<&str>) -> Result<String, FetchError> {
        let base = base_url.unwrap_or(&self.config.base_url);
        if base.is_empty() {
            return Err(FetchError::NotConfigured);
        }

        let url = format!("{}/metrics", base.trim_end_matches('/'));
        let mut request = self.http.get(&url);
        if !self.config.api_key.is_empty() {
            request = request.basic_auth("", Some(&self.config.api_key));
        }

        let timeout = self.config.timeout;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        };

        let response = request.send().await.map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(map_err)
    }

    /// Fetch and parse in one step.
    pub async fn fetch_and_parse(&self, base_url: Option<&str>) -> Result<ParsedMonitors, FetchError> {
        let text = self.fetch_metrics_text(base_url).await?;
        let monitors = parse_monitors(&text);
        tracing::debug!("Parsed {} monitors from {} bytes", monitors.len(), text.len());
        Ok(monitors)
    }
}
