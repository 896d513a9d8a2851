//! Configuration module for kumawatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Connection settings for the upstream Uptime Kuma instance.
#[derive(Debug, Clone)]
pub struct KumaConfig {
    /// Base URL of the Uptime Kuma instance, e.g. `http://192.168.1.3:3001`
    pub base_url: String,
    /// API key sent as the Basic auth password (empty disables auth)
    pub api_key: String,
    /// Upper bound on one metrics request
    pub timeout: Duration,
    /// Whether to verify TLS certificates on HTTPS URLs
    pub verify_tls: bool,
}

impl Default for KumaConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(10),
            verify_tls: true,
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "kumawatch.db")
    pub db_path: String,
    /// Time between fetch cycles (default: 60s)
    pub fetch_interval: Duration,
    pub kuma: KumaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "kumawatch.db".to_string(),
            fetch_interval: Duration::from_secs(60),
            kuma: KumaConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KUMAWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `KUMAWATCH_DB_PATH`: Database file path (default: "kumawatch.db")
    /// - `KUMAWATCH_FETCH_INTERVAL`: Seconds between fetch cycles (default: 60)
    /// - `UPTIME_KUMA_URL`: Uptime Kuma base URL (default: empty)
    /// - `UPTIME_KUMA_API_KEY`: API key (default: empty)
    /// - `UPTIME_KUMA_TIMEOUT`: Request timeout in seconds (default: 10)
    /// - `UPTIME_KUMA_VERIFY_TLS`: Verify TLS certificates (default: true)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("KUMAWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("KUMAWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(secs) = env_secs("KUMAWATCH_FETCH_INTERVAL") {
            cfg.fetch_interval = secs;
        }

        if let Ok(base_url) = env::var("UPTIME_KUMA_URL") {
            cfg.kuma.base_url = base_url.trim().to_string();
        }

        if let Ok(api_key) = env::var("UPTIME_KUMA_API_KEY") {
            cfg.kuma.api_key = api_key;
        }

        if let Some(secs) = env_secs("UPTIME_KUMA_TIMEOUT") {
            cfg.kuma.timeout = secs;
        }

        if let Some(verify) = env::var("UPTIME_KUMA_VERIFY_TLS").ok().and_then(|v| parse_bool(&v)) {
            cfg.kuma.verify_tls = verify;
        }

        cfg
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
