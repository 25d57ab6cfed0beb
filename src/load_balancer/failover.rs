//! Primary/backup failover selection.

use std::sync::Arc;
use std::time::Instant;

use crate::health::state::HealthPolicy;
use crate::load_balancer::backend::Target;
use crate::load_balancer::pool::RoutingGroup;

/// Target chosen for one attempt.
#[derive(Debug, Clone)]
pub struct Selection {
    pub target: Arc<Target>,
    /// Every target was failed; the primary is tried anyway.
    pub last_resort: bool,
}

/// Strict priority router: the first selectable target in group order wins.
///
/// Backups are ordered fallbacks, never peers, so there is no balancing
/// between targets of the same role.
#[derive(Debug, Clone)]
pub struct FailoverRouter {
    policy: HealthPolicy,
}

impl FailoverRouter {
    pub fn new(policy: HealthPolicy) -> Self {
        Self { policy }
    }

    pub fn select(&self, group: &RoutingGroup, now: Instant) -> Selection {
        for target in group.targets() {
            if target.health().observe(now, &self.policy).is_selectable() {
                return Selection {
                    target: target.clone(),
                    last_resort: false,
                };
            }
        }

        tracing::debug!(primary = %group.primary().id(), "All targets failed, forcing primary");
        Selection {
            target: group.primary().clone(),
            last_resort: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use axum::http::uri::Authority;
    use crate::config::Role;
    use crate::health::state::HealthState;

    fn group() -> RoutingGroup {
        RoutingGroup::new(vec![
            Arc::new(Target::new("blue", Role::Primary, Authority::from_static("127.0.0.1:3000"))),
            Arc::new(Target::new("green", Role::Backup, Authority::from_static("127.0.0.1:3001"))),
            Arc::new(Target::new("red", Role::Backup, Authority::from_static("127.0.0.1:3002"))),
        ])
        .unwrap()
    }

    fn router() -> FailoverRouter {
        FailoverRouter::new(HealthPolicy {
            max_fails: 1,
            fail_timeout: Duration::from_secs(10),
        })
    }

    fn fail(group: &RoutingGroup, id: &str, at: Instant) {
        group.get(id).unwrap().health().force(HealthState::Failed, at);
    }

    #[test]
    fn test_prefers_healthy_primary() {
        let group = group();
        let selection = router().select(&group, Instant::now());
        assert_eq!(selection.target.id(), "blue");
        assert!(!selection.last_resort);
    }

    #[test]
    fn test_suspect_primary_still_preferred() {
        let group = group();
        let now = Instant::now();
        group.primary().health().force(HealthState::Suspect, now);
        assert_eq!(router().select(&group, now).target.id(), "blue");
    }

    #[test]
    fn test_backups_in_order() {
        let group = group();
        let now = Instant::now();
        fail(&group, "blue", now);
        assert_eq!(router().select(&group, now).target.id(), "green");

        fail(&group, "green", now);
        assert_eq!(router().select(&group, now).target.id(), "red");
    }

    #[test]
    fn test_all_failed_forces_primary() {
        let group = group();
        let now = Instant::now();
        for id in ["blue", "green", "red"] {
            fail(&group, id, now);
        }
        let selection = router().select(&group, now);
        assert_eq!(selection.target.id(), "blue");
        assert!(selection.last_resort);
    }

    #[test]
    fn test_primary_reprobed_after_fail_timeout() {
        let group = group();
        let start = Instant::now();
        fail(&group, "blue", start);

        assert_eq!(router().select(&group, start + Duration::from_secs(5)).target.id(), "green");

        let selection = router().select(&group, start + Duration::from_secs(10));
        assert_eq!(selection.target.id(), "blue");
        assert_eq!(group.primary().health().snapshot().state, HealthState::Suspect);
    }
}
