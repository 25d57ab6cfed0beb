//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the routing group shape (one primary, at least one backup)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::{ProxyConfig, Role};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("at least two targets are required, found {0}")]
    TooFewTargets(usize),

    #[error("target id must not be empty")]
    EmptyTargetId,

    #[error("duplicate target id '{0}'")]
    DuplicateTargetId(String),

    #[error("target '{id}' has invalid address '{address}' (expected host:port)")]
    InvalidTargetAddress { id: String, address: String },

    #[error("exactly one primary target is required, found {0}")]
    PrimaryCount(usize),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("alerts.error_rate_threshold must be within 0-100, got {0}")]
    ThresholdOutOfRange(String),

    #[error("alerts.slack_webhook_url is not a valid URL")]
    InvalidWebhook,

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }
    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    validate_targets(config, &mut errors);

    if config.health.max_fails == 0 {
        errors.push(ValidationError::Zero("health.max_fails"));
    }
    if config.health.fail_timeout_ms == 0 {
        errors.push(ValidationError::Zero("health.fail_timeout_ms"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_ms"));
    }
    if config.timeouts.read_ms == 0 {
        errors.push(ValidationError::Zero("timeouts.read_ms"));
    }
    if config.timeouts.overall_ms == 0 {
        errors.push(ValidationError::Zero("timeouts.overall_ms"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("listener.max_body_bytes"));
    }

    let alerts = &config.alerts;
    if alerts.window_size == 0 {
        errors.push(ValidationError::Zero("alerts.window_size"));
    }
    if !(0.0..=100.0).contains(&alerts.error_rate_threshold) {
        errors.push(ValidationError::ThresholdOutOfRange(alerts.error_rate_threshold.to_string()));
    }
    if !alerts.slack_webhook_url.is_empty() && url::Url::parse(&alerts.slack_webhook_url).is_err() {
        errors.push(ValidationError::InvalidWebhook);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_targets(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    if config.targets.len() < 2 {
        errors.push(ValidationError::TooFewTargets(config.targets.len()));
    }

    let mut seen = HashSet::new();
    for target in &config.targets {
        if target.id.is_empty() {
            errors.push(ValidationError::EmptyTargetId);
        } else if !seen.insert(target.id.as_str()) {
            errors.push(ValidationError::DuplicateTargetId(target.id.clone()));
        }

        if !is_host_port(&target.address) {
            errors.push(ValidationError::InvalidTargetAddress {
                id: target.id.clone(),
                address: target.address.clone(),
            });
        }
    }

    let primaries = config.targets.iter().filter(|t| t.role == Role::Primary).count();
    if primaries != 1 {
        errors.push(ValidationError::PrimaryCount(primaries));
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// True when `address` is a bare `host:port` authority (no scheme, path or userinfo).
pub(crate) fn is_host_port(address: &str) -> bool {
    match address.parse::<Authority>() {
        Ok(authority) => authority.port_u16().is_some() && !authority.as_str().contains('@') && !authority.host().is_empty(),
        Err(_) => false,
    }
}
