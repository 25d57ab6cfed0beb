//! Target selection subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     TargetConfig[] → backend.rs (Target) → pool.rs (RoutingGroup, primary first)
//!
//! Per attempt:
//!     failover.rs reads each target's health in group order
//!     → first Healthy/Suspect target wins
//!     → all Failed: primary as last resort
//! ```
//!
//! # Design Decisions
//! - Group is immutable after construction; only health mutates
//! - No balancing: exactly one target is authoritative at a time
//! - Health is per-target, never per-group

pub mod backend;
pub mod failover;
pub mod pool;

pub use backend::Target;
pub use failover::{FailoverRouter, Selection};
pub use pool::{GroupError, RoutingGroup};
