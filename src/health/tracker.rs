//! Applies attempt outcomes to target health.

use std::time::Instant;

use crate::health::passive::Outcome;
use crate::health::state::{HealthPolicy, HealthState, Transition};
use crate::load_balancer::Target;
use crate::observability::metrics;

/// Feeds classified outcomes into each target's state machine.
///
/// Holds no per-target state itself; each target owns its own lock.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    policy: HealthPolicy,
}

impl HealthTracker {
    pub fn new(policy: HealthPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Record one attempt's outcome. Returns `None` for outcomes that leave health untouched.
    pub fn record(&self, target: &Target, outcome: Outcome, now: Instant) -> Option<Transition> {
        let transition = match outcome {
            Outcome::Success => {
                target.count_attempt(false);
                target.health().record_success()
            }
            Outcome::RetryableFailure(kind) => {
                target.count_attempt(true);
                let transition = target.health().record_failure(now, &self.policy);
                tracing::debug!(
                    target_id = %target.id(),
                    kind = kind.as_str(),
                    failure_count = transition.failure_count,
                    "Attempt failed"
                );
                transition
            }
            Outcome::FatalFailure => {
                target.count_attempt(false);
                tracing::warn!(target_id = %target.id(), "Fatal attempt failure, health unchanged");
                return None;
            }
        };

        self.report(target, &transition, "traffic");
        Some(transition)
    }

    /// Administrative override of a target's state.
    pub fn force(&self, target: &Target, state: HealthState, now: Instant) -> Transition {
        let transition = target.health().force(state, now);
        self.report(target, &transition, "admin");
        transition
    }

    /// Current state at `now`, including time-based promotion.
    pub fn state(&self, target: &Target, now: Instant) -> HealthState {
        target.health().observe(now, &self.policy)
    }

    fn report(&self, target: &Target, transition: &Transition, cause: &'static str) {
        if !transition.changed() {
            return;
        }
        match transition.to {
            HealthState::Failed => tracing::warn!(
                target_id = %target.id(),
                from = %transition.from,
                to = %transition.to,
                failure_count = transition.failure_count,
                cause,
                "Target marked failed"
            ),
            _ => tracing::info!(
                target_id = %target.id(),
                from = %transition.from,
                to = %transition.to,
                cause,
                "Target health changed"
            ),
        }
        metrics::record_transition(target.id(), transition.to);
    }
}
