//! Retry policy.
//!
//! # Responsibilities
//! - Bound the number of tries per request
//! - Decide whether a failed attempt may be repeated elsewhere
//!
//! # Design Decisions
//! - Retries go to a different target immediately, no backoff
//! - Every method is retried by default; the safety knob limits non-idempotent
//!   requests to failures where the backend never saw them
//! - Connection failures are always retryable

use axum::http::Method;

use crate::config::RetryConfig;
use crate::health::passive::FailureKind;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_non_idempotent: bool,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_non_idempotent: config.retry_non_idempotent,
        }
    }

    /// Total tries allowed for one request, first attempt included.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a request with `method` that failed with `kind` may be sent to another target.
    pub fn is_retryable(&self, method: &Method, kind: FailureKind) -> bool {
        !kind.request_may_have_reached_backend() || method.is_idempotent() || self.retry_non_idempotent
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
