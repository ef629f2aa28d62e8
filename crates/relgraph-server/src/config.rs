//! Configuration management for relgraph.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use relgraph_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("relgraph.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use relgraph_domain::resolver::ResolverConfig;
use serde::{Deserialize, Serialize};

/// Environment variable prefix; `RELGRAPH_RESOLVER__MAX_DEPTH` sets
/// `resolver.max_depth`.
pub const ENV_PREFIX: &str = "RELGRAPH";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Graph resolver settings
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Request size limits
    #[serde(default)]
    pub limits: LimitSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Graph resolver settings.
///
/// ```yaml
/// resolver:
///   max_depth: 25
///   timeout_ms: 30000
///   list_concurrency: 16
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverSettings {
    /// Maximum traversal depth for one check.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Deadline for one check (and for a whole list operation).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Candidate checks run concurrently by ListObjects / ListUsers.
    #[serde(default = "default_list_concurrency")]
    pub list_concurrency: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            timeout_ms: default_timeout_ms(),
            list_concurrency: default_list_concurrency(),
        }
    }
}

impl ResolverSettings {
    /// Converts to the resolver's own configuration type.
    pub fn to_resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_max_depth(self.max_depth)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_list_concurrency(self.list_concurrency)
    }
}

fn default_max_depth() -> u32 {
    25
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_list_concurrency() -> usize {
    16
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LimitSettings {
    /// Maximum writes plus deletes in one `write` call.
    #[serde(default = "default_max_tuples_per_write")]
    pub max_tuples_per_write: usize,

    /// Maximum type definitions in one model.
    #[serde(default = "default_max_types_per_model")]
    pub max_types_per_model: usize,

    /// Maximum size of a model document in bytes.
    #[serde(default = "default_max_model_size_bytes")]
    pub max_model_size_bytes: usize,

    /// Maximum objects returned by ListObjects.
    #[serde(default = "default_max_list_objects")]
    pub max_list_objects: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_tuples_per_write: default_max_tuples_per_write(),
            max_types_per_model: default_max_types_per_model(),
            max_model_size_bytes: default_max_model_size_bytes(),
            max_list_objects: default_max_list_objects(),
        }
    }
}

fn default_max_tuples_per_write() -> usize {
    100
}

fn default_max_types_per_model() -> usize {
    100
}

fn default_max_model_size_bytes() -> usize {
    256 * 1024
}

fn default_max_list_objects() -> usize {
    1000
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RELGRAPH_` and use `__` as
    /// separator, e.g. `RELGRAPH_LIMITS__MAX_TUPLES_PER_WRITE=50`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(env_source())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let positive = [
            ("resolver.max_depth", self.resolver.max_depth as u64),
            ("resolver.timeout_ms", self.resolver.timeout_ms),
            ("resolver.list_concurrency", self.resolver.list_concurrency as u64),
            ("limits.max_tuples_per_write", self.limits.max_tuples_per_write as u64),
            ("limits.max_types_per_model", self.limits.max_types_per_model as u64),
            ("limits.max_model_size_bytes", self.limits.max_model_size_bytes as u64),
            ("limits.max_list_objects", self.limits.max_list_objects as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigLoadError::Invalid {
                    message: format!("{key} must be greater than 0"),
                });
            }
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

/// `RELGRAPH_` variables with `__` between nested keys.
fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}
