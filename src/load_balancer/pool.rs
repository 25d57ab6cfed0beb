//! Routing group management.
//!
//! # Responsibilities
//! - Build the ordered target list from configuration
//! - Keep the primary first, backups in configured order
//! - Look targets up by id for the admin surface

use std::sync::Arc;

use crate::config::{Role, TargetConfig};
use crate::load_balancer::backend::{InvalidTarget, Target};

/// Errors raised while assembling a routing group.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),

    #[error("routing group needs exactly one primary, found {0}")]
    PrimaryCount(usize),

    #[error("routing group needs at least one backup")]
    NoBackup,
}

/// Immutable ordered list of targets: primary first, then backups.
#[derive(Debug)]
pub struct RoutingGroup {
    targets: Vec<Arc<Target>>,
}

impl RoutingGroup {
    /// Build a group from target definitions.
    pub fn from_config(configs: &[TargetConfig]) -> Result<Self, GroupError> {
        let targets = configs
            .iter()
            .map(|config| Target::from_config(config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(targets)
    }

    pub fn new(mut targets: Vec<Arc<Target>>) -> Result<Self, GroupError> {
        let primaries = targets.iter().filter(|t| t.role() == Role::Primary).count();
        if primaries != 1 {
            return Err(GroupError::PrimaryCount(primaries));
        }
        if targets.len() < 2 {
            return Err(GroupError::NoBackup);
        }

        // Stable sort keeps backups in configured order.
        targets.sort_by_key(|t| t.role() != Role::Primary);

        tracing::debug!(
            targets = ?targets.iter().map(|t| t.id()).collect::<Vec<_>>(),
            "Routing group built"
        );
        Ok(Self { targets })
    }

    pub fn primary(&self) -> &Arc<Target> {
        &self.targets[0]
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Target>> {
        self.targets.iter().find(|t| t.id() == id)
    }
}
