//! Node address parsing.
//!
//! A node list is a `;`-separated string of `host:port` tokens. Each token may
//! carry an `identity@` prefix naming the node; the prefix is dropped. Order
//! and duplicates are preserved.

use rustls::pki_types::ServerName;
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult};

/// Separator between node tokens.
pub const NODE_DELIMITER: char = ';';

/// A ledger node's channel address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// TLS server name for the handshake.
    pub fn server_name(&self) -> LedgerResult<ServerName<'static>> {
        ServerName::try_from(self.host.clone()).map_err(|e| {
            LedgerError::Configuration(format!("invalid server name '{}': {}", self.host, e))
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = LedgerError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        let address = match token.rsplit_once('@') {
            Some((_, address)) => address,
            None => token,
        };

        let invalid = |reason: &str| {
            LedgerError::Configuration(format!("invalid node address '{}': {}", token, reason))
        };

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            let (host, port) = rest.split_once("]:").ok_or_else(|| invalid("expected [host]:port"))?;
            (host, port)
        } else {
            let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
            if host.contains(':') {
                return Err(invalid("IPv6 hosts must be bracketed"));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        if host.chars().any(|c| c.is_whitespace() || c == '@' || c == '/') {
            return Err(invalid("host contains illegal characters"));
        }

        let port: u16 = port.parse().map_err(|_| invalid("port is not a number in 1-65535"))?;
        if port == 0 {
            return Err(invalid("port must not be 0"));
        }

        Ok(Self::new(host, port))
    }
}

/// Parse a `;`-separated node list.
///
/// Blank tokens (e.g. from a trailing `;`) are skipped. An empty list, or any
/// token that is not `host:port`, is a configuration error.
pub fn parse_node_list(input: &str) -> LedgerResult<Vec<Endpoint>> {
    let endpoints = input
        .split(NODE_DELIMITER)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Endpoint::from_str)
        .collect::<LedgerResult<Vec<_>>>()?;

    if endpoints.is_empty() {
        return Err(LedgerError::Configuration("node list is empty".to_string()));
    }
    Ok(endpoints)
}
