//! Failover reverse proxy (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ retrying proxy ──▶ failover router ──▶ target (primary | backup)
//!                                      │                   ▲
//!                                      ▼                   │
//!                              outcome classifier ──▶ health tracker
//!
//!     Side channels: admin API, alert monitor, Prometheus exporter
//! ```

use std::path::PathBuf;

use clap::Parser;

use failover_proxy::config::load_config;
use failover_proxy::lifecycle::{signals, startup, Shutdown};
use failover_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "failover-proxy")]
#[command(about = "Primary/backup failover reverse proxy", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Targets have no defaults, so it is required.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "failover-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        targets = config.targets.len(),
        max_fails = config.health.max_fails,
        fail_timeout_ms = config.health.fail_timeout_ms,
        max_retries = config.retries.max_retries,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
