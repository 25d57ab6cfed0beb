//! Timeout enforcement.
//!
//! # Responsibilities
//! - Hold the connect, read and overall deadlines
//! - Size each attempt phase so the overall ceiling is never exceeded
//!
//! # Design Decisions
//! - Connect and read timeouts are independent: unused connect time never
//!   extends the wait for response headers
//! - The overall ceiling is checked independently of attempt timeouts
//! - Timed-out requests return 504 Gateway Timeout

use std::time::{Duration, Instant};

use crate::config::TimeoutConfig;

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub overall: Duration,
}

impl Timeouts {
    pub fn new(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_millis(config.connect_ms),
            read: Duration::from_millis(config.read_ms),
            overall: Duration::from_millis(config.overall_ms),
        }
    }

    pub fn deadline(&self, start: Instant) -> Deadline {
        Deadline {
            at: start + self.overall,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new(&TimeoutConfig::default())
    }
}

/// Overall request deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.at.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.at
    }

    /// Time allowed for one phase capped at `limit`, or `None` when the ceiling has been reached.
    pub fn budget(&self, now: Instant, limit: Duration) -> Option<Duration> {
        let remaining = self.remaining(now);
        if remaining.is_zero() {
            None
        } else {
            Some(remaining.min(limit))
        }
    }
}
