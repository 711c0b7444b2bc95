//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the ledger channel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Heartbeat intervals without any inbound frame before a connection is dropped.
pub const HEARTBEAT_MISSES: u32 = 2;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LedgerConfig {
    /// Node list, group, identity sources.
    pub system: SystemConfig,

    /// Channel connection timings.
    pub channel: ChannelConfig,

    /// TLS material resource names and search path.
    pub resources: ResourceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Node list, group and signing identity settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// `;`-separated node list, tokens optionally prefixed `identity@`.
    #[serde(alias = "nodeStr")]
    pub node_str: String,

    /// Organization identifier.
    #[serde(alias = "orgId")]
    pub org_id: u32,

    /// Ledger group the pool and dispatcher are bound to.
    #[serde(alias = "groupId")]
    pub group_id: u32,

    /// Signature scheme selector (0 = ECDSA secp256k1, 1 = SM2/SM3).
    #[serde(alias = "encryptType")]
    pub encrypt_type: i32,

    /// Hex-encoded private key. Takes precedence over `private_key_pem`.
    #[serde(alias = "privateKey")]
    pub private_key: Option<String>,

    /// Resource name of a PEM-encoded private key.
    #[serde(alias = "privateKeyPem")]
    pub private_key_pem: Option<String>,

    /// Fail startup when neither key source is configured.
    #[serde(alias = "requireIdentity")]
    pub require_identity: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            node_str: String::new(),
            org_id: 0,
            group_id: 1,
            encrypt_type: 0,
            private_key: None,
            private_key_pem: None,
            require_identity: false,
        }
    }
}

/// Channel connection timings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Overall bound on pool start.
    pub connect_secs: u64,

    /// Bound on one dial plus TLS handshake; must be below the start window.
    pub handshake_timeout_ms: u64,

    /// Minimum spacing between reconnect attempts to the same node.
    pub connect_sleep_per_millis: u64,

    /// Upper bound on the reconnect delay.
    pub max_reconnect_delay_ms: u64,

    /// Per-request timeout for reads and submissions.
    pub request_timeout_ms: u64,

    /// Heartbeat interval on idle connections.
    pub heartbeat_secs: u64,
}

impl ChannelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Inbound silence after which a connection is considered dead.
    pub fn idle_timeout(&self) -> Duration {
        self.heartbeat_interval() * HEARTBEAT_MISSES
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_secs: 60,
            handshake_timeout_ms: 5_000,
            connect_sleep_per_millis: 30,
            max_reconnect_delay_ms: 2_000,
            request_timeout_ms: 30_000,
            heartbeat_secs: 30,
        }
    }
}

/// Where TLS and key resources are looked up.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directories searched in order for resource names.
    pub search_paths: Vec<PathBuf>,

    /// CA certificate (PEM).
    pub ca_cert: String,

    /// Client certificate presented to nodes (PEM).
    pub node_cert: String,

    /// Client private key (PEM).
    pub node_key: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("conf"), PathBuf::from(".")],
            ca_cert: "ca.crt".to_string(),
            node_cert: "node.crt".to_string(),
            node_key: "node.key".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_parameters() {
        let config = LedgerConfig::default();
        assert_eq!(config.channel.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.channel.request_timeout(), Duration::from_millis(30_000));
        assert_eq!(config.channel.connect_sleep_per_millis, 30);
        assert!(config.channel.handshake_timeout() < config.channel.connect_timeout());
        assert_eq!(config.channel.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.system.group_id, 1);
        assert_eq!(config.resources.ca_cert, "ca.crt");
    }

    #[test]
    fn test_accepts_camel_case_keys() {
        let config: LedgerConfig = toml::from_str(
            r#"
            [system]
            nodeStr = "node0@127.0.0.1:20200"
            groupId = 2
            encryptType = 1
            privateKeyPem = "account.pem"
            "#,
        )
        .unwrap();

        assert_eq!(config.system.node_str, "node0@127.0.0.1:20200");
        assert_eq!(config.system.group_id, 2);
        assert_eq!(config.system.encrypt_type, 1);
        assert_eq!(config.system.private_key_pem.as_deref(), Some("account.pem"));
        assert!(config.system.private_key.is_none());
    }
}
