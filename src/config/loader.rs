//! Configuration loading from disk and from the worker environment snapshot.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable carrying the JSON configuration snapshot to workers.
pub const CONFIG_ENV_VAR: &str = "CLUSTER_PROXY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Snapshot(serde_json::Error),
    MissingSnapshot,
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Snapshot(e) => write!(f, "Snapshot error: {}", e),
            ConfigError::MissingSnapshot => {
                write!(f, "{} is not set; workers must be started by the dispatcher", CONFIG_ENV_VAR)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    load_from_str(&content)
}

/// Parse and validate configuration from TOML text.
pub fn load_from_str(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Serialize a configuration into the snapshot handed to workers.
pub fn to_snapshot(config: &ProxyConfig) -> Result<String, ConfigError> {
    serde_json::to_string(config).map_err(ConfigError::Snapshot)
}

/// Parse a worker snapshot. The dispatcher validated it already.
pub fn from_snapshot(snapshot: &str) -> Result<ProxyConfig, ConfigError> {
    serde_json::from_str(snapshot).map_err(ConfigError::Snapshot)
}

/// Read the snapshot from [`CONFIG_ENV_VAR`].
pub fn from_env() -> Result<ProxyConfig, ConfigError> {
    let snapshot = std::env::var(CONFIG_ENV_VAR).map_err(|_| ConfigError::MissingSnapshot)?;
    from_snapshot(&snapshot)
}
