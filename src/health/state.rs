//! Target health state machine.
//!
//! # States
//! - Healthy: target receives traffic
//! - Suspect: fail timeout elapsed, next attempt decides
//! - Failed: target skipped by the router
//!
//! # State Transitions
//! ```text
//! Healthy → Failed:  consecutive failures >= max_fails
//! Failed  → Suspect: now - failed_since >= fail_timeout (evaluated on read)
//! Suspect → Healthy: one success
//! Suspect → Failed:  one failure (failed_since reset)
//! any     → Healthy: any success
//! ```
//!
//! # Design Decisions
//! - One mutex per target, never a global lock
//! - Recovery is immediate on the first success
//! - The lock is never held across an await point

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Health of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Suspect,
    Failed,
}

impl HealthState {
    /// Whether the router may send traffic to a target in this state.
    pub fn is_selectable(self) -> bool {
        !matches!(self, HealthState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Suspect => "suspect",
            HealthState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds driving the state machine.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub max_fails: u32,
    pub fail_timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            max_fails: 1,
            fail_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of applying one event to a target's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
    pub failure_count: u32,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Point-in-time copy of a target's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub state: HealthState,
    pub failure_count: u32,
    pub failed_since: Option<Instant>,
}

#[derive(Debug)]
struct HealthRecord {
    state: HealthState,
    failure_count: u32,
    failed_since: Option<Instant>,
}

impl HealthRecord {
    fn promote_if_due(&mut self, now: Instant, fail_timeout: Duration) {
        if self.state != HealthState::Failed {
            return;
        }
        if let Some(since) = self.failed_since {
            if now.saturating_duration_since(since) >= fail_timeout {
                self.state = HealthState::Suspect;
            }
        }
    }

    fn fail(&mut self, now: Instant) {
        self.state = HealthState::Failed;
        self.failed_since = Some(now);
    }
}

/// Mutable health block owned by one target.
#[derive(Debug)]
pub struct TargetHealth {
    inner: Mutex<HealthRecord>,
}

impl Default for TargetHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetHealth {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HealthRecord {
                state: HealthState::Healthy,
                failure_count: 0,
                failed_since: None,
            }),
        }
    }

    /// Current state at `now`, promoting Failed to Suspect once the fail timeout has elapsed.
    pub fn observe(&self, now: Instant, policy: &HealthPolicy) -> HealthState {
        let mut record = self.inner.lock();
        record.promote_if_due(now, policy.fail_timeout);
        record.state
    }

    /// Apply a successful attempt.
    pub fn record_success(&self) -> Transition {
        let mut record = self.inner.lock();
        let from = record.state;
        record.failure_count = 0;
        record.state = HealthState::Healthy;
        record.failed_since = None;
        Transition {
            from,
            to: record.state,
            failure_count: 0,
        }
    }

    /// Apply a retryable failure observed at `now`.
    pub fn record_failure(&self, now: Instant, policy: &HealthPolicy) -> Transition {
        let mut record = self.inner.lock();
        record.promote_if_due(now, policy.fail_timeout);
        let from = record.state;
        record.failure_count = record.failure_count.saturating_add(1);

        match from {
            // The single re-probe failed, or a last-resort attempt confirmed the outage.
            HealthState::Suspect | HealthState::Failed => record.fail(now),
            HealthState::Healthy if record.failure_count >= policy.max_fails => record.fail(now),
            HealthState::Healthy => {}
        }

        Transition {
            from,
            to: record.state,
            failure_count: record.failure_count,
        }
    }

    /// Administrative override. Goes through the same lock as traffic-driven updates.
    pub fn force(&self, state: HealthState, now: Instant) -> Transition {
        let mut record = self.inner.lock();
        let from = record.state;
        match state {
            HealthState::Healthy => {
                record.state = HealthState::Healthy;
                record.failure_count = 0;
                record.failed_since = None;
            }
            HealthState::Suspect => record.state = HealthState::Suspect,
            HealthState::Failed => record.fail(now),
        }
        Transition {
            from,
            to: record.state,
            failure_count: record.failure_count,
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let record = self.inner.lock();
        HealthSnapshot {
            state: record.state,
            failure_count: record.failure_count,
            failed_since: record.failed_since,
        }
    }
}
