//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): client requests by method, status, target
//! - `proxy_request_duration_seconds` (histogram): client-facing latency
//! - `proxy_attempts_total` (counter): upstream attempts by target and outcome
//! - `proxy_attempt_duration_seconds` (histogram): upstream attempt latency
//! - `proxy_retries_total` (counter): attempts beyond the first
//! - `proxy_target_state` (gauge): 0=healthy, 1=suspect, 2=failed
//! - `proxy_health_transitions_total` (counter): state changes by target and new state
//! - `proxy_alerts_total` (counter): alerts raised by kind

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::state::HealthState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, target: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(target: &str, outcome: &'static str, latency: Duration) {
    counter!("proxy_attempts_total", "target" => target.to_string(), "outcome" => outcome).increment(1);
    histogram!("proxy_attempt_duration_seconds", "target" => target.to_string()).record(latency.as_secs_f64());
}

pub fn record_retry() {
    counter!("proxy_retries_total").increment(1);
}

pub fn record_target_state(target: &str, state: HealthState) {
    let value = match state {
        HealthState::Healthy => 0.0,
        HealthState::Suspect => 1.0,
        HealthState::Failed => 2.0,
    };
    gauge!("proxy_target_state", "target" => target.to_string()).set(value);
}

pub fn record_transition(target: &str, to: HealthState) {
    counter!("proxy_health_transitions_total", "target" => target.to_string(), "to" => to.as_str()).increment(1);
    record_target_state(target, to);
}

pub fn record_alert(kind: &'static str) {
    counter!("proxy_alerts_total", "kind" => kind).increment(1);
}
