//! Passive health subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt completes
//!     → passive.rs (classify: Success / RetryableFailure / FatalFailure)
//!     → tracker.rs (apply to the target, log + metrics on transition)
//!     → state.rs (per-target state machine under its own lock)
//!
//! Router reads state.rs:
//!     Failed targets turn Suspect once fail_timeout has elapsed
//! ```
//!
//! # Design Decisions
//! - Health comes only from real traffic; there are no probe requests
//! - Recovery is immediate on the first success
//! - Health state is per-target, never global

pub mod passive;
pub mod state;
pub mod tracker;

pub use passive::{classify, FailureKind, Observation, Outcome};
pub use state::{HealthPolicy, HealthSnapshot, HealthState, TargetHealth, Transition};
pub use tracker::HealthTracker;
