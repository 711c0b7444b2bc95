//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::LedgerConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::error::LedgerError;

/// Environment variable overriding `system.private_key`.
pub const PRIVATE_KEY_ENV_VAR: &str = "LEDGER_PRIVATE_KEY";

/// Environment variable overriding `system.node_str`.
pub const NODE_STR_ENV_VAR: &str = "LEDGER_NODE_STR";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for LedgerError {
    fn from(err: ConfigError) -> Self {
        LedgerError::Configuration(err.to_string())
    }
}

/// Load, apply environment overrides to, and validate a TOML configuration file.
pub fn load_config(path: &Path) -> Result<LedgerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config = parse_config(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Parse a configuration document without validating it.
pub fn parse_config(content: &str) -> Result<LedgerConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Replace config values with non-empty environment values.
pub fn apply_env_overrides<F>(config: &mut LedgerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(PRIVATE_KEY_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        tracing::debug!(var = PRIVATE_KEY_ENV_VAR, "Private key taken from environment");
        config.system.private_key = Some(key);
    }
    if let Some(nodes) = lookup(NODE_STR_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        tracing::debug!(var = NODE_STR_ENV_VAR, "Node list taken from environment");
        config.system.node_str = nodes;
    }
}
