//! Primary/backup failover reverse proxy.
//!
//! Every request goes to the primary target while it is healthy. Connection
//! errors, timeouts and gateway-class 5xx responses mark a target failed and
//! the request is replayed once against the next target in order, so clients
//! see the backup's answer instead of the failure.

pub mod admin;
pub mod alerts;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
