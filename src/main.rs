//! kumawatch - Uptime Kuma metrics history and reports
//!
//! Periodically snapshots the Uptime Kuma `/metrics` endpoint into SQLite and
//! serves dashboard and report views over the stored history.

mod config;
mod db;
mod kuma;
mod report;
mod scheduler;
mod web;

use config::ServerConfig;
use db::Store;
use kuma::KumaClient;
use scheduler::Scheduler;
use web::Server;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kumawatch")]
#[command(about = "Uptime Kuma metrics history and reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the web API (default)
    Serve,

    /// Run a single fetch cycle and exit
    Fetch {
        /// Base URL to fetch from instead of UPTIME_KUMA_URL
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("kumawatch=info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = ServerConfig::load();

    tracing::info!("Using database at {}", cfg.db_path);
    let store = Arc::new(Store::new(&cfg.db_path)?);

    let client = KumaClient::new(cfg.kuma.clone())?;
    let scheduler = Arc::new(Scheduler::new(store.clone(), client, cfg.fetch_interval));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("Starting kumawatch on port {}...", cfg.http_port);
            scheduler.start();

            let server = Server::new(cfg, store, scheduler);
            server.start().await?;
        }
        Commands::Fetch { base_url } => {
            let report = scheduler.run_cycle(base_url.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
