//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the failover proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Ordered upstream targets. Order among backups is failover order.
    pub targets: Vec<TargetConfig>,

    /// Passive health tracking settings.
    pub health: HealthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Failover and error-rate alerting.
    pub alerts: AlertConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body buffered for replay on retry.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Role a target plays inside the routing group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Backup,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Primary => f.write_str("primary"),
            Role::Backup => f.write_str("backup"),
        }
    }
}

/// Upstream target definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Stable identifier, also the pool name reported by the backend (e.g. "blue").
    pub id: String,

    /// Primary or backup.
    pub role: Role,

    /// Backend address as `host:port` (e.g., "app_blue:3000").
    pub address: String,
}

/// Passive health tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive retryable failures before a target is marked failed.
    pub max_fails: u32,

    /// How long a failed target stays out of rotation before it is re-probed.
    pub fail_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_fails: 1,
            fail_timeout_ms: 10_000,
        }
    }
}

impl HealthConfig {
    pub fn fail_timeout(&self) -> Duration {
        Duration::from_millis(self.fail_timeout_ms)
    }
}

/// Timeout configuration for upstream attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time allowed for the backend to produce response headers, in milliseconds.
    pub read_ms: u64,

    /// Hard ceiling for the whole request across all attempts, in milliseconds.
    pub overall_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            read_ms: 3_000,
            overall_ms: 5_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (1 means two tries in total).
    pub max_retries: u32,

    /// Retry non-idempotent methods even when the backend may have seen the request.
    /// Turn off to only replay POST/PATCH after a connect failure.
    pub retry_non_idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_non_idempotent: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Alerting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Enable the alert monitor.
    pub enabled: bool,

    /// Slack incoming webhook. Empty means alerts are only logged.
    pub slack_webhook_url: String,

    /// Pool expected to serve traffic in steady state.
    pub active_pool: String,

    /// 5xx percentage over the window that triggers an error-rate alert.
    pub error_rate_threshold: f64,

    /// Number of recent requests considered for the error rate.
    pub window_size: usize,

    /// Minimum seconds between two alerts of the same kind.
    pub cooldown_secs: u64,

    /// Suppress failover alerts during planned maintenance.
    pub maintenance_mode: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slack_webhook_url: String::new(),
            active_pool: "blue".to_string(),
            error_rate_threshold: 2.0,
            window_size: 200,
            cooldown_secs: 300,
            maintenance_mode: false,
        }
    }
}
