//! Signing identities and transaction signatures.
//!
//! # Security
//! - Key material never reaches a log line or a `Debug` rendering
//! - Identities are immutable once derived and shared as `Arc<Identity>`

use alloy::hex;
use alloy::primitives::{Address, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as _;
use signature::{Signer as _, Verifier as _};
use sm2::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;

use crate::error::{LedgerError, LedgerResult};
use crate::identity::scheme::{SignatureScheme, SM2_DISTID};

/// Length of an EC private scalar for both supported curves.
pub const SCALAR_LEN: usize = 32;

enum SigningKey {
    Secp256k1(PrivateKeySigner),
    Sm2(Box<sm2::dsa::SigningKey>),
}

/// A private key bound to its signature scheme, public key and address.
pub struct Identity {
    scheme: SignatureScheme,
    key: SigningKey,
    public_key: [u8; 64],
    address: Address,
}

impl Identity {
    /// Derive an identity from a big-endian private scalar.
    ///
    /// Scalars shorter than 32 bytes are left-padded with zeros.
    pub fn from_scalar(scheme: SignatureScheme, scalar: &[u8]) -> LedgerResult<Self> {
        if scalar.is_empty() || scalar.len() > SCALAR_LEN {
            return Err(LedgerError::Configuration(format!(
                "private key must be 1-{} bytes, got {}",
                SCALAR_LEN,
                scalar.len()
            )));
        }
        let mut padded = [0u8; SCALAR_LEN];
        padded[SCALAR_LEN - scalar.len()..].copy_from_slice(scalar);

        let invalid = || {
            LedgerError::Configuration(format!("private key is not a valid {} scalar", scheme))
        };

        let (key, public_key) = match scheme {
            SignatureScheme::Ecdsa => {
                let signer = PrivateKeySigner::from_slice(&padded).map_err(|_| invalid())?;
                let point = signer.credential().verifying_key().to_encoded_point(false);
                let public_key = uncompressed_xy(point.as_bytes())?;
                (SigningKey::Secp256k1(signer), public_key)
            }
            SignatureScheme::Sm => {
                let secret = sm2::SecretKey::from_slice(&padded).map_err(|_| invalid())?;
                let point = secret.public_key().to_encoded_point(false);
                let public_key = uncompressed_xy(point.as_bytes())?;
                let signing = sm2::dsa::SigningKey::new(SM2_DISTID, &secret).map_err(|_| invalid())?;
                (SigningKey::Sm2(Box::new(signing)), public_key)
            }
        };

        Ok(Self {
            scheme,
            key,
            address: scheme.address_of(&public_key),
            public_key,
        })
    }

    /// Derive an identity from a hex private key, with or without `0x`.
    pub fn from_hex(scheme: SignatureScheme, private_key_hex: &str) -> LedgerResult<Self> {
        let digits = private_key_hex.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let digits = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let scalar = hex::decode(&digits)
            .map_err(|_| LedgerError::Configuration("private key is not valid hex".to_string()))?;
        Self::from_scalar(scheme, &scalar)
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Uncompressed public key without the SEC1 `0x04` tag.
    pub fn public_key(&self) -> &[u8; 64] {
        &self.public_key
    }

    /// Sign a 32-byte digest produced by this identity's scheme.
    pub async fn sign_hash(&self, hash: B256) -> LedgerResult<TransactionSignature> {
        match &self.key {
            SigningKey::Secp256k1(signer) => {
                let sig = signer
                    .sign_hash(&hash)
                    .await
                    .map_err(|e| LedgerError::Signing(format!("secp256k1 signing failed: {}", e)))?;
                Ok(TransactionSignature::Secp256k1 {
                    v: 27 + u8::from(sig.v()),
                    r: sig.r(),
                    s: sig.s(),
                })
            }
            SigningKey::Sm2(key) => {
                let sig: sm2::dsa::Signature = key
                    .try_sign(hash.as_slice())
                    .map_err(|e| LedgerError::Signing(format!("SM2 signing failed: {}", e)))?;
                let bytes = sig.to_bytes();
                Ok(TransactionSignature::Sm2 {
                    public_key: self.public_key,
                    r: U256::from_be_slice(&bytes[..32]),
                    s: U256::from_be_slice(&bytes[32..]),
                })
            }
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("scheme", &self.scheme)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn uncompressed_xy(sec1: &[u8]) -> LedgerResult<[u8; 64]> {
    match sec1 {
        [0x04, xy @ ..] if xy.len() == 64 => {
            let mut out = [0u8; 64];
            out.copy_from_slice(xy);
            Ok(out)
        }
        _ => Err(LedgerError::Signing(
            "public key is not an uncompressed SEC1 point".to_string(),
        )),
    }
}

/// Signature fields carried by a signed ledger transaction.
///
/// Under SM the `v` slot carries the signer's public key, since SM2
/// signatures cannot be used to recover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSignature {
    Secp256k1 { v: u8, r: U256, s: U256 },
    Sm2 { public_key: [u8; 64], r: U256, s: U256 },
}

impl TransactionSignature {
    /// Rebuild from wire fields, interpreting `v` under `scheme`.
    pub fn from_parts(scheme: SignatureScheme, v: &[u8], r: U256, s: U256) -> LedgerResult<Self> {
        match scheme {
            SignatureScheme::Ecdsa => match v {
                [v @ (27 | 28)] => Ok(TransactionSignature::Secp256k1 { v: *v, r, s }),
                _ => Err(LedgerError::Protocol(format!(
                    "invalid secp256k1 recovery byte {}",
                    hex::encode_prefixed(v)
                ))),
            },
            SignatureScheme::Sm => {
                let public_key: [u8; 64] = v.try_into().map_err(|_| {
                    LedgerError::Protocol(format!("SM2 public key must be 64 bytes, got {}", v.len()))
                })?;
                Ok(TransactionSignature::Sm2 { public_key, r, s })
            }
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            TransactionSignature::Secp256k1 { .. } => SignatureScheme::Ecdsa,
            TransactionSignature::Sm2 { .. } => SignatureScheme::Sm,
        }
    }

    pub fn r(&self) -> U256 {
        match self {
            TransactionSignature::Secp256k1 { r, .. } | TransactionSignature::Sm2 { r, .. } => *r,
        }
    }

    pub fn s(&self) -> U256 {
        match self {
            TransactionSignature::Secp256k1 { s, .. } | TransactionSignature::Sm2 { s, .. } => *s,
        }
    }

    /// The `v` slot as it appears on the wire.
    pub fn v_bytes(&self) -> Vec<u8> {
        match self {
            TransactionSignature::Secp256k1 { v, .. } => vec![*v],
            TransactionSignature::Sm2 { public_key, .. } => public_key.to_vec(),
        }
    }

    /// Verify the signature over `hash` and return the signer's address.
    pub fn recover_signer(&self, hash: B256) -> LedgerResult<Address> {
        match self {
            TransactionSignature::Secp256k1 { v, r, s } => {
                let parity = match v {
                    27 => false,
                    28 => true,
                    other => {
                        return Err(LedgerError::Signing(format!("invalid recovery byte {}", other)))
                    }
                };
                Signature::new(*r, *s, parity)
                    .recover_address_from_prehash(&hash)
                    .map_err(|e| LedgerError::Signing(format!("signer recovery failed: {}", e)))
            }
            TransactionSignature::Sm2 { public_key, r, s } => {
                let mut sec1 = [0u8; 65];
                sec1[0] = 0x04;
                sec1[1..].copy_from_slice(public_key);
                let key = sm2::dsa::VerifyingKey::from_sec1_bytes(SM2_DISTID, &sec1)
                    .map_err(|_| LedgerError::Signing("invalid SM2 public key".to_string()))?;

                let mut raw = [0u8; 64];
                raw[..32].copy_from_slice(&r.to_be_bytes::<32>());
                raw[32..].copy_from_slice(&s.to_be_bytes::<32>());
                let sig = sm2::dsa::Signature::from_bytes(&raw)
                    .map_err(|_| LedgerError::Signing("malformed SM2 signature".to_string()))?;

                key.verify(hash.as_slice(), &sig)
                    .map_err(|_| LedgerError::Signing("SM2 signature does not verify".to_string()))?;
                Ok(SignatureScheme::Sm.address_of(public_key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_ecdsa_address_derivation() {
        let identity = Identity::from_hex(SignatureScheme::Ecdsa, ANVIL_KEY).unwrap();
        assert_eq!(identity.address().to_string().to_lowercase(), ANVIL_ADDRESS);

        let prefixed = Identity::from_hex(SignatureScheme::Ecdsa, &format!("0x{}", ANVIL_KEY)).unwrap();
        assert_eq!(prefixed.address(), identity.address());
    }

    #[test]
    fn test_same_scalar_differs_per_scheme() {
        let ecdsa = Identity::from_hex(SignatureScheme::Ecdsa, ANVIL_KEY).unwrap();
        let sm = Identity::from_hex(SignatureScheme::Sm, ANVIL_KEY).unwrap();
        assert_eq!(sm.scheme(), SignatureScheme::Sm);
        assert_ne!(ecdsa.address(), sm.address());
        assert_ne!(ecdsa.public_key(), sm.public_key());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let too_long = "ff".repeat(33);
        for bad in ["", "zz", "0x", too_long.as_str()] {
            let err = Identity::from_hex(SignatureScheme::Ecdsa, bad).unwrap_err();
            assert!(matches!(err, LedgerError::Configuration(_)), "{bad}: {err}");
        }
        // Zero is not a valid scalar on either curve.
        let zero = "00".repeat(32);
        assert!(Identity::from_hex(SignatureScheme::Ecdsa, &zero).is_err());
        assert!(Identity::from_hex(SignatureScheme::Sm, &zero).is_err());
    }

    #[test]
    fn test_short_scalar_is_left_padded() {
        let short = Identity::from_hex(SignatureScheme::Ecdsa, "1").unwrap();
        let full = Identity::from_hex(SignatureScheme::Ecdsa, &format!("{:0>64}", "1")).unwrap();
        assert_eq!(short.address(), full.address());
    }

    #[test]
    fn test_debug_hides_key() {
        let identity = Identity::from_hex(SignatureScheme::Ecdsa, ANVIL_KEY).unwrap();
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains(ANVIL_KEY));
        assert!(rendered.contains("address"));
    }

    #[tokio::test]
    async fn test_ecdsa_signature_recovers_signer() {
        let identity = Identity::from_hex(SignatureScheme::Ecdsa, ANVIL_KEY).unwrap();
        let hash = SignatureScheme::Ecdsa.hash(b"payload");
        let sig = identity.sign_hash(hash).await.unwrap();

        assert!(matches!(sig, TransactionSignature::Secp256k1 { v: 27 | 28, .. }));
        assert_eq!(sig.recover_signer(hash).unwrap(), identity.address());

        let other = SignatureScheme::Ecdsa.hash(b"other");
        assert_ne!(sig.recover_signer(other).ok(), Some(identity.address()));
    }

    #[tokio::test]
    async fn test_sm2_signature_verifies() {
        let identity = Identity::from_hex(SignatureScheme::Sm, ANVIL_KEY).unwrap();
        let hash = SignatureScheme::Sm.hash(b"payload");
        let sig = identity.sign_hash(hash).await.unwrap();

        assert_eq!(sig.v_bytes(), identity.public_key().to_vec());
        assert_eq!(sig.recover_signer(hash).unwrap(), identity.address());

        let other = SignatureScheme::Sm.hash(b"other");
        assert!(matches!(sig.recover_signer(other), Err(LedgerError::Signing(_))));
    }

    #[test]
    fn test_from_parts_checks_v() {
        let r = U256::from(1);
        let s = U256::from(2);
        assert!(TransactionSignature::from_parts(SignatureScheme::Ecdsa, &[27], r, s).is_ok());
        assert!(TransactionSignature::from_parts(SignatureScheme::Ecdsa, &[1], r, s).is_err());
        assert!(TransactionSignature::from_parts(SignatureScheme::Sm, &[0u8; 64], r, s).is_ok());
        assert!(TransactionSignature::from_parts(SignatureScheme::Sm, &[0u8; 63], r, s).is_err());
    }
}
