//! Backend target abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream endpoint (id, role, address)
//! - Own the target's health block
//! - Count attempts and failures for the admin surface

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::uri::Authority;

use crate::config::{Role, TargetConfig};
use crate::health::state::TargetHealth;

/// Error raised when a target definition cannot be turned into a [`Target`].
#[derive(Debug, thiserror::Error)]
#[error("target '{id}' has invalid address '{address}'")]
pub struct InvalidTarget {
    pub id: String,
    pub address: String,
}

/// A single upstream backend.
#[derive(Debug)]
pub struct Target {
    id: String,
    role: Role,
    /// `host:port` used as the authority of forwarded requests.
    address: Authority,
    health: TargetHealth,
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl Target {
    pub fn new(id: impl Into<String>, role: Role, address: Authority) -> Self {
        Self {
            id: id.into(),
            role,
            address,
            health: TargetHealth::new(),
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, InvalidTarget> {
        let address = Authority::from_str(&config.address).map_err(|_| InvalidTarget {
            id: config.id.clone(),
            address: config.address.clone(),
        })?;
        Ok(Self::new(config.id.clone(), config.role, address))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn address(&self) -> &Authority {
        &self.address
    }

    pub fn health(&self) -> &TargetHealth {
        &self.health
    }

    /// Count one attempt; `failed` marks it as a retryable failure.
    pub fn count_attempt(&self, failed: bool) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
