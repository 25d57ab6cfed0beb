//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Hand backend responses to the client untouched (status, headers, streamed body)
//! - Map proxy failures to 502 / 504 / 413 responses
//!
//! # Design Decisions
//! - Backend 4xx are not errors; they pass through verbatim
//! - Connection-class failures and exhausted 5xx retries surface as 502
//! - Attempt and overall timeouts surface as 504

use std::time::Duration;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use thiserror::Error;

use crate::health::passive::FailureKind;

/// Failures surfaced to the client instead of a backend response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Connection refused, reset or broken.
    #[error("upstream '{target}' connection failed")]
    Connection { target: String },

    /// Attempt deadline exceeded.
    #[error("upstream '{target}' timed out")]
    Timeout { target: String },

    /// Overall request ceiling reached across attempts.
    #[error("request exceeded overall deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// Backend kept answering 5xx until the retry budget ran out.
    #[error("upstream '{target}' answered {status}")]
    UpstreamServer { target: String, status: StatusCode },

    /// All targets were failed and the forced last-resort attempt failed too.
    #[error("no upstream available, last resort '{target}' failed")]
    RoutingExhausted { target: String },

    /// Upstream request could not be constructed.
    #[error("could not build upstream request: {0}")]
    Rejected(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl ProxyError {
    /// Error for a retryable failure that will not be retried.
    pub fn from_failure(kind: FailureKind, target: &str, last_resort: bool) -> Self {
        let target = target.to_string();
        if last_resort {
            return ProxyError::RoutingExhausted { target };
        }
        match kind {
            FailureKind::Connect | FailureKind::Connection => ProxyError::Connection { target },
            FailureKind::Timeout => ProxyError::Timeout { target },
            FailureKind::ServerError(status) => ProxyError::UpstreamServer { target, status },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Timeout { .. } | ProxyError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Connection { .. }
            | ProxyError::UpstreamServer { .. }
            | ProxyError::RoutingExhausted { .. }
            | ProxyError::Rejected(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason.to_string()).into_response()
    }
}

/// Convert a backend response for the client without touching status or headers.
pub fn forward_response(response: axum::http::Response<Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
