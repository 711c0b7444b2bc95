//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Node list must parse into at least one endpoint
//! - Encrypt type must name a known signature scheme
//! - Timeouts and intervals must be non-zero
//! - A single handshake attempt must fit inside the start window
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LedgerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::channel::endpoint::parse_node_list;
use crate::config::schema::LedgerConfig;
use crate::identity::SignatureScheme;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &LedgerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_node_list(&config.system.node_str) {
        errors.push(ValidationError::new("system.node_str", e.to_string()));
    }

    if config.system.group_id == 0 {
        errors.push(ValidationError::new("system.group_id", "must be greater than 0"));
    }

    if let Err(e) = SignatureScheme::try_from(config.system.encrypt_type) {
        errors.push(ValidationError::new("system.encrypt_type", e.to_string()));
    }

    let channel = &config.channel;
    if channel.connect_secs == 0 {
        errors.push(ValidationError::new("channel.connect_secs", "must be greater than 0"));
    }
    if channel.handshake_timeout_ms == 0 {
        errors.push(ValidationError::new("channel.handshake_timeout_ms", "must be greater than 0"));
    } else if channel.handshake_timeout_ms >= channel.connect_secs.saturating_mul(1_000) {
        errors.push(ValidationError::new(
            "channel.handshake_timeout_ms",
            "must be below connect_secs so a node gets more than one attempt",
        ));
    }
    if channel.connect_sleep_per_millis == 0 {
        errors.push(ValidationError::new(
            "channel.connect_sleep_per_millis",
            "must be greater than 0",
        ));
    }
    if channel.max_reconnect_delay_ms < channel.connect_sleep_per_millis {
        errors.push(ValidationError::new(
            "channel.max_reconnect_delay_ms",
            "must not be below connect_sleep_per_millis",
        ));
    }
    if channel.request_timeout_ms == 0 {
        errors.push(ValidationError::new("channel.request_timeout_ms", "must be greater than 0"));
    }
    if channel.heartbeat_secs == 0 {
        errors.push(ValidationError::new("channel.heartbeat_secs", "must be greater than 0"));
    }

    let resources = &config.resources;
    if resources.search_paths.is_empty() {
        errors.push(ValidationError::new("resources.search_paths", "must not be empty"));
    }
    for (field, name) in [
        ("resources.ca_cert", &resources.ca_cert),
        ("resources.node_cert", &resources.node_cert),
        ("resources.node_key", &resources.node_key),
    ] {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(field, "resource name must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
