//! Startup orchestration.
//!
//! # Responsibilities
//! - Start background tasks (metrics exporter, alert monitor)
//! - Start the admin API when enabled
//! - Bind the proxy listener last and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::{serve_admin, AdminState};
use crate::alerts::{AlertMonitor, Notifier, RECORD_BUFFER};
use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid routing group: {0}")]
    Group(#[from] crate::load_balancer::GroupError),

    #[error("failed to bind {what} on {address}: {source}")]
    Bind {
        what: &'static str,
        address: String,
        source: std::io::Error,
    },

    #[error("alert notifier: {0}")]
    Notifier(#[from] reqwest::Error),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run every subsystem with an already validated configuration until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = HttpServer::new(config.clone())?;

    if config.alerts.enabled {
        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let notifier = Notifier::from_config(&config.alerts)?;
        let monitor = AlertMonitor::new(config.alerts.clone());
        tokio::spawn(monitor.run(rx, notifier, shutdown.subscribe()));
        server = server.with_alerts(tx);
    } else {
        tracing::info!("Alerting disabled");
    }

    if config.admin.enabled {
        let listener = bind("admin API", &config.admin.bind_address).await?;
        let state = AdminState {
            proxy: server.proxy(),
            api_key: config.admin.api_key.as_str().into(),
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let listener = bind("proxy listener", &config.listener.bind_address).await?;
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}

async fn bind(what: &'static str, address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        what,
        address: address.to_string(),
        source,
    })
}
