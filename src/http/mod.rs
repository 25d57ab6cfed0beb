//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body buffering)
//!     → request.rs (request ID, upstream request construction)
//!     → proxy.rs (select target, attempt, classify, retry)
//!     → response.rs (forward backend response or map the failure)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::{Exchange, RetryingProxy};
pub use request::{ForwardRequest, RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::HttpServer;
