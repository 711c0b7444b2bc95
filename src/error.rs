//! Error taxonomy shared by every subsystem.

use alloy::primitives::{Address, TxHash, U256};
use thiserror::Error;

/// Errors that can occur while connecting to, querying, or submitting to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing configuration, TLS material, or key material.
    /// Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No node reachable, or no live channel connection for a request.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// An operation needed a signing identity but none was configured.
    #[error("Identity error: {operation} requires a signing identity but none is configured")]
    Identity { operation: &'static str },

    /// A request exceeded its deadline.
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: &'static str, millis: u64 },

    /// The node refused a submitted transaction.
    #[error("Transaction from {address} with nonce {nonce} rejected (code {code}): {reason}")]
    Rejected {
        address: Address,
        nonce: U256,
        code: i64,
        reason: String,
    },

    /// The transaction was included but its execution failed.
    #[error("Transaction {hash} executed with status {status}")]
    Reverted { hash: TxHash, status: String },

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed frame or response payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Key derivation or signature failure.
    #[error("Signing error: {0}")]
    Signing(String),
}

impl LedgerError {
    /// True for errors a caller may retry once the pool has reconnected.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Connectivity(_) | LedgerError::Timeout { .. })
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::Timeout {
            operation: "getBlockNumber",
            millis: 30_000,
        };
        assert_eq!(err.to_string(), "getBlockNumber timed out after 30000 ms");

        let err = LedgerError::Identity { operation: "submit" };
        assert!(err.to_string().contains("submit"));
    }

    #[test]
    fn test_rejection_carries_nonce_and_address() {
        let err = LedgerError::Rejected {
            address: Address::ZERO,
            nonce: U256::from(7u64),
            code: 10000,
            reason: "nonce already used".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("nonce 7"));
        assert!(text.contains("nonce already used"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::Connectivity("down".into()).is_transient());
        assert!(!LedgerError::Configuration("bad".into()).is_transient());
    }
}
