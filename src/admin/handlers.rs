use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::Role;
use crate::health::HealthState;
use crate::load_balancer::Target;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub primary: String,
    /// Target the next request would be sent to.
    pub active: String,
    pub last_resort: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetStatus {
    pub id: String,
    pub role: Role,
    pub address: String,
    pub state: HealthState,
    pub failure_count: u32,
    pub failed_for_secs: Option<f64>,
    pub total_attempts: u64,
    pub total_failures: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateOverride {
    pub state: HealthState,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let selection = state.proxy.router().select(state.proxy.group(), Instant::now());
    let status = if selection.last_resort {
        "degraded"
    } else if selection.target.role() == Role::Backup {
        "failover"
    } else {
        "operational"
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: status.to_string(),
        primary: state.proxy.group().primary().id().to_string(),
        active: selection.target.id().to_string(),
        last_resort: selection.last_resort,
    })
}

pub async fn get_targets(State(state): State<AdminState>) -> Json<Vec<TargetStatus>> {
    let now = Instant::now();
    let statuses = state
        .proxy
        .group()
        .targets()
        .iter()
        .map(|target| target_status(&state, target, now))
        .collect();
    Json(statuses)
}

pub async fn set_target_state(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<StateOverride>,
) -> Result<Json<TargetStatus>, StatusCode> {
    let target = state.proxy.group().get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let now = Instant::now();
    let transition = state.proxy.tracker().force(target, body.state, now);

    tracing::info!(target_id = %id, from = %transition.from, to = %transition.to, "Manual health override");
    Ok(Json(target_status(&state, target, now)))
}

fn target_status(state: &AdminState, target: &Target, now: Instant) -> TargetStatus {
    let current = state.proxy.tracker().state(target, now);
    let snapshot = target.health().snapshot();
    TargetStatus {
        id: target.id().to_string(),
        role: target.role(),
        address: target.address().to_string(),
        state: current,
        failure_count: snapshot.failure_count,
        failed_for_secs: snapshot
            .failed_since
            .map(|since| now.saturating_duration_since(since).as_secs_f64()),
        total_attempts: target.total_attempts(),
        total_failures: target.total_failures(),
    }
}
