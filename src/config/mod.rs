//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the routing group never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{finalize_config, load_config, ConfigError};
pub use schema::{
    AdminConfig, AlertConfig, HealthConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    RetryConfig, Role, TargetConfig, TimeoutConfig,
};
