//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (overall deadline, per-attempt budget)
//!     → On failure: retries.rs (may this request go to another target?)
//!     → health tracker marks the failing target (see crate::health)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Retries never go back to the target that just failed

pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::{Deadline, Timeouts};
