//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, Role};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {name}: '{value}'")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file, applying process environment overrides.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    finalize_config(config)
}

/// Validate an in-memory configuration after applying process environment overrides.
pub fn finalize_config(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the deployment environment variables on top of file configuration.
///
/// `ACTIVE_POOL` designates which target holds the primary role; every other
/// target becomes a backup in its configured order.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(pool) = lookup("ACTIVE_POOL").filter(|v| !v.is_empty()) {
        if !config.targets.iter().any(|t| t.id == pool) {
            return Err(ConfigError::Env {
                name: "ACTIVE_POOL",
                value: pool,
            });
        }
        for target in &mut config.targets {
            target.role = if target.id == pool { Role::Primary } else { Role::Backup };
        }
        config.alerts.active_pool = pool;
    }

    if let Some(url) = lookup("SLACK_WEBHOOK_URL") {
        config.alerts.slack_webhook_url = url;
    }
    if let Some(value) = lookup("ERROR_RATE_THRESHOLD") {
        config.alerts.error_rate_threshold = parse_env("ERROR_RATE_THRESHOLD", value)?;
    }
    if let Some(value) = lookup("WINDOW_SIZE") {
        config.alerts.window_size = parse_env("WINDOW_SIZE", value)?;
    }
    if let Some(value) = lookup("ALERT_COOLDOWN_SEC") {
        config.alerts.cooldown_secs = parse_env("ALERT_COOLDOWN_SEC", value)?;
    }
    if let Some(value) = lookup("MAINTENANCE_MODE") {
        config.alerts.maintenance_mode = value.eq_ignore_ascii_case("true");
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { name, value })
}
