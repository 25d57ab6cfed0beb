//! Passive health checking (outcome classification).
//!
//! # Responsibilities
//! - Turn the raw result of an attempt into a verdict
//! - Decide which failures justify trying another target
//!
//! # Design Decisions
//! - Only transport errors, timeouts and 500/502/503/504 count as failures
//! - 4xx are NOT failures (the backend answered)
//! - Pure function, no side effects

use axum::http::StatusCode;

/// What the proxy saw when an attempt finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Backend produced response headers.
    Status(StatusCode),
    /// Connection could not be established (refused, unreachable, DNS).
    ConnectFailed,
    /// Connection reset or broken before a response arrived.
    ConnectionError,
    /// Attempt deadline exceeded while connecting or waiting for headers.
    Timeout,
    /// The upstream request could not be built; the backend was never contacted.
    Rejected,
}

/// Kind of retryable failure, kept so the final error maps to 502 or 504.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connect,
    Connection,
    Timeout,
    ServerError(StatusCode),
}

impl FailureKind {
    /// Whether the backend may have received the request.
    pub fn request_may_have_reached_backend(self) -> bool {
        !matches!(self, FailureKind::Connect)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Connect => "connect",
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::ServerError(_) => "server_error",
        }
    }
}

/// Verdict for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RetryableFailure(FailureKind),
    FatalFailure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::RetryableFailure(_) => "retryable_failure",
            Outcome::FatalFailure => "fatal_failure",
        }
    }
}

fn is_gateway_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Classify a finished attempt.
pub fn classify(observation: Observation) -> Outcome {
    match observation {
        Observation::Status(status) if is_gateway_failure(status) => {
            Outcome::RetryableFailure(FailureKind::ServerError(status))
        }
        Observation::Status(_) => Outcome::Success,
        Observation::ConnectFailed => Outcome::RetryableFailure(FailureKind::Connect),
        Observation::ConnectionError => Outcome::RetryableFailure(FailureKind::Connection),
        Observation::Timeout => Outcome::RetryableFailure(FailureKind::Timeout),
        Observation::Rejected => Outcome::FatalFailure,
    }
}
