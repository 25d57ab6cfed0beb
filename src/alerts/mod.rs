//! Alerting subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler
//!     → RequestRecord (pool, status, release, upstream) over a bounded channel
//!     → monitor.rs (sliding window, failover / error-rate / recovery detection)
//!     → notifier.rs (Slack webhook or log)
//! ```
//!
//! # Design Decisions
//! - Records are dropped when the channel is full; traffic never waits on alerting
//! - Cooldown per alert kind
//! - Maintenance mode mutes failover alerts only

pub mod monitor;
pub mod notifier;

pub use monitor::AlertMonitor;
pub use notifier::Notifier;

/// Channel capacity between the proxy and the alert monitor.
pub const RECORD_BUFFER: usize = 1024;

/// One completed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// Target that served (or last failed) the request.
    pub pool: String,
    /// Status returned to the client.
    pub status: u16,
    /// `X-Release-Id` reported by the backend, when it answered.
    pub release: Option<String>,
    /// Address of the target that served the request.
    pub upstream: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Failover,
    ErrorRate,
    Recovery,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Failover => "failover",
            AlertKind::ErrorRate => "error_rate",
            AlertKind::Recovery => "recovery",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AlertKind::Failover => "FAILOVER",
            AlertKind::ErrorRate => "ERROR RATE",
            AlertKind::Recovery => "RECOVERY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}
