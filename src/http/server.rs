//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Buffer request bodies so attempts can be replayed
//! - Hand requests to the retrying proxy and report the result
//! - Graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::alerts::RequestRecord;
use crate::config::ProxyConfig;
use crate::http::proxy::RetryingProxy;
use crate::http::request::{request_id_middleware, ForwardRequest, RequestIdExt};
use crate::http::response::{forward_response, ProxyError};
use crate::load_balancer::GroupError;
use crate::observability::metrics;

/// Release marker set by the backends, passed on to alerting.
const X_RELEASE_ID: &str = "x-release-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<RetryingProxy>,
    pub max_body_bytes: usize,
    pub records: Option<mpsc::Sender<RequestRecord>>,
}

/// HTTP server for the failover proxy.
pub struct HttpServer {
    config: ProxyConfig,
    proxy: Arc<RetryingProxy>,
    records: Option<mpsc::Sender<RequestRecord>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, GroupError> {
        let proxy = Arc::new(RetryingProxy::new(&config)?);
        Ok(Self {
            config,
            proxy,
            records: None,
        })
    }

    /// Report every completed request to the alert monitor.
    pub fn with_alerts(mut self, records: mpsc::Sender<RequestRecord>) -> Self {
        self.records = Some(records);
        self
    }

    /// Shared proxy core, used by the admin API.
    pub fn proxy(&self) -> Arc<RetryingProxy> {
        self.proxy.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let state = AppState {
            proxy: self.proxy.clone(),
            max_body_bytes: self.config.listener.max_body_bytes,
            records: self.records.clone(),
        };

        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(request_id_middleware)),
            )
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            primary = %self.proxy.group().primary().id(),
            targets = self.proxy.group().targets().len(),
            "HTTP server starting"
        );

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: every method and path goes through the retrying proxy.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .request_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    let declared_len = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.max_body_bytes) {
        metrics::record_request(&method, 413, "none", start_time);
        return ProxyError::PayloadTooLarge(state.max_body_bytes).into_response();
    }

    let (parts, body) = request.into_parts();
    // Chunked bodies are only measured while reading.
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to buffer request body");
            metrics::record_request(&method, 413, "none", start_time);
            return ProxyError::PayloadTooLarge(state.max_body_bytes).into_response();
        }
    };

    let forward = ForwardRequest::new(parts, body, peer, request_id.clone());
    let exchange = state.proxy.handle(&forward).await;
    let target_id = exchange.target.id().to_string();
    let upstream = exchange.target.address().to_string();
    let mut release = None;

    let response = match exchange.result {
        Ok(response) => {
            release = response
                .headers()
                .get(X_RELEASE_ID)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            forward_response(response)
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                target_id = %target_id,
                attempts = exchange.attempts,
                error = %e,
                "Request failed"
            );
            e.into_response()
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(&method, status, &target_id, start_time);

    if let Some(records) = &state.records {
        // Alerting is best effort; never slow down traffic for it.
        let _ = records.try_send(RequestRecord {
            pool: target_id,
            status,
            release,
            upstream,
        });
    }

    response
}
