//! Signature scheme (the ledger's "encrypt type").

use alloy::primitives::{keccak256, Address, B256};
use sm3::{Digest, Sm3};
use std::fmt;

use crate::error::LedgerError;

/// SM2 user id used when signing and verifying under the SM scheme.
pub const SM2_DISTID: &str = "1234567812345678";

/// Curve and hash family used for keys, addresses and transaction hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureScheme {
    /// secp256k1 + keccak256.
    #[default]
    Ecdsa,
    /// SM2 + SM3.
    Sm,
}

impl SignatureScheme {
    /// Configuration code: 0 for ECDSA, 1 for SM.
    pub fn code(self) -> i32 {
        match self {
            SignatureScheme::Ecdsa => 0,
            SignatureScheme::Sm => 1,
        }
    }

    /// Hash `data` with the scheme's digest.
    pub fn hash(self, data: &[u8]) -> B256 {
        match self {
            SignatureScheme::Ecdsa => keccak256(data),
            SignatureScheme::Sm => B256::from_slice(&Sm3::digest(data)),
        }
    }

    /// Account address of a 64-byte uncompressed public key (x || y).
    pub fn address_of(self, public_key: &[u8; 64]) -> Address {
        Address::from_slice(&self.hash(public_key)[12..])
    }
}

impl TryFrom<i32> for SignatureScheme {
    type Error = LedgerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SignatureScheme::Ecdsa),
            1 => Ok(SignatureScheme::Sm),
            other => Err(LedgerError::Configuration(format!(
                "unknown encrypt type {} (expected 0 for ECDSA or 1 for SM)",
                other
            ))),
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureScheme::Ecdsa => write!(f, "ecdsa"),
            SignatureScheme::Sm => write!(f, "sm"),
        }
    }
}
