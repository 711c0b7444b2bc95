//! Resolve the caller's signing identity from configuration.
//!
//! # Responsibilities
//! - Pick exactly one secret source: raw hex key first, then PEM resource
//! - Parse PKCS#8 or SEC1 PEM keys for the configured curve
//! - Report "no identity" as `Ok(None)` unless strict mode is on

use std::fmt;
use std::io::BufReader;
use std::sync::Arc;

use k256::pkcs8::DecodePrivateKey as _;
use rustls::pki_types::PrivateKeyDer;

use crate::config::{ResourceResolver, SystemConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::keys::Identity;
use crate::identity::scheme::SignatureScheme;

/// Where the private key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Hex-encoded private scalar.
    RawKey(String),
    /// Resource name of a PEM private key.
    PemResource(String),
}

impl SecretSource {
    /// Select the source: a non-empty raw key wins over a non-empty PEM name.
    pub fn from_config(system: &SystemConfig) -> Option<Self> {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(key) = non_empty(&system.private_key) {
            return Some(SecretSource::RawKey(key.to_string()));
        }
        non_empty(&system.private_key_pem).map(|name| SecretSource::PemResource(name.to_string()))
    }

    fn kind(&self) -> &'static str {
        match self {
            SecretSource::RawKey(_) => "raw_key",
            SecretSource::PemResource(_) => "pem",
        }
    }
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::RawKey(_) => f.write_str("RawKey(<redacted>)"),
            SecretSource::PemResource(name) => f.debug_tuple("PemResource").field(name).finish(),
        }
    }
}

/// Resolve the signing identity under `scheme`.
///
/// Returns `Ok(None)` when no source is configured and `require_identity` is
/// off; dispatchers built from it refuse to sign.
pub fn resolve(
    system: &SystemConfig,
    scheme: SignatureScheme,
    resources: &ResourceResolver,
) -> LedgerResult<Option<Arc<Identity>>> {
    let Some(source) = SecretSource::from_config(system) else {
        if system.require_identity {
            return Err(LedgerError::Configuration(
                "no signing identity configured: set system.private_key or system.private_key_pem"
                    .to_string(),
            ));
        }
        tracing::warn!("No signing identity configured, transaction submission disabled");
        return Ok(None);
    };

    let identity = match &source {
        SecretSource::RawKey(hex) => Identity::from_hex(scheme, hex)?,
        SecretSource::PemResource(name) => {
            let pem = resources.read(name)?;
            identity_from_pem(scheme, &pem)?
        }
    };

    tracing::info!(
        address = %identity.address(),
        scheme = %scheme,
        source = source.kind(),
        "Signing identity resolved"
    );
    Ok(Some(Arc::new(identity)))
}

/// Derive an identity from the first private key in a PEM document.
pub fn identity_from_pem(scheme: SignatureScheme, pem: &[u8]) -> LedgerResult<Identity> {
    let key = rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(|e| LedgerError::Configuration(format!("private key PEM is malformed: {}", e)))?
        .ok_or_else(|| {
            LedgerError::Configuration("private key PEM holds no private key".to_string())
        })?;

    let wrong_curve = |e: &dyn fmt::Display| {
        LedgerError::Configuration(format!("PEM key is not a {} key: {}", scheme, e))
    };

    let scalar = match (scheme, &key) {
        (SignatureScheme::Ecdsa, PrivateKeyDer::Pkcs8(der)) => {
            k256::SecretKey::from_pkcs8_der(der.secret_pkcs8_der())
                .map_err(|e| wrong_curve(&e))?
                .to_bytes()
                .to_vec()
        }
        (SignatureScheme::Ecdsa, PrivateKeyDer::Sec1(der)) => {
            k256::SecretKey::from_sec1_der(der.secret_sec1_der())
                .map_err(|e| wrong_curve(&e))?
                .to_bytes()
                .to_vec()
        }
        (SignatureScheme::Sm, PrivateKeyDer::Pkcs8(der)) => {
            sm2::SecretKey::from_pkcs8_der(der.secret_pkcs8_der())
                .map_err(|e| wrong_curve(&e))?
                .to_bytes()
                .to_vec()
        }
        (SignatureScheme::Sm, PrivateKeyDer::Sec1(der)) => {
            sm2::SecretKey::from_sec1_der(der.secret_sec1_der())
                .map_err(|e| wrong_curve(&e))?
                .to_bytes()
                .to_vec()
        }
        _ => {
            return Err(LedgerError::Configuration(
                "PEM key is not an EC private key".to_string(),
            ))
        }
    };

    Identity::from_scalar(scheme, &scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SECP_PEM_HEX: &str = "778b89448a0f69859e5fbd95970a5a78ac5717c05038ef25448a92e0bf2890fa";
    const SM2_PEM_HEX: &str = "0fd1d387a745118e42bbd4f8706386024e634db16d6181c460c9fd0f56cc6453";
    const OTHER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn fixtures() -> ResourceResolver {
        ResourceResolver::new(vec![
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
        ])
    }

    fn system(raw: Option<&str>, pem: Option<&str>) -> SystemConfig {
        SystemConfig {
            private_key: raw.map(String::from),
            private_key_pem: pem.map(String::from),
            ..SystemConfig::default()
        }
    }

    #[test]
    fn test_raw_key_takes_precedence() {
        let source = SecretSource::from_config(&system(Some(OTHER_KEY), Some("secp256k1.pem")));
        assert_eq!(source, Some(SecretSource::RawKey(OTHER_KEY.to_string())));

        let identity = resolve(
            &system(Some(OTHER_KEY), Some("secp256k1.pem")),
            SignatureScheme::Ecdsa,
            &fixtures(),
        )
        .unwrap()
        .unwrap();
        let expected = Identity::from_hex(SignatureScheme::Ecdsa, OTHER_KEY).unwrap();
        assert_eq!(identity.address(), expected.address());
    }

    #[test]
    fn test_blank_raw_key_falls_through_to_pem() {
        let source = SecretSource::from_config(&system(Some("  "), Some("secp256k1.pem")));
        assert_eq!(source, Some(SecretSource::PemResource("secp256k1.pem".to_string())));
    }

    #[test]
    fn test_no_source_is_none() {
        assert_eq!(SecretSource::from_config(&system(None, Some(""))), None);
        let resolved = resolve(&system(None, None), SignatureScheme::Ecdsa, &fixtures()).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_strict_mode_requires_identity() {
        let mut config = system(None, None);
        config.require_identity = true;
        let err = resolve(&config, SignatureScheme::Ecdsa, &fixtures()).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn test_pkcs8_and_sec1_pem_match_raw_key() {
        let expected = Identity::from_hex(SignatureScheme::Ecdsa, SECP_PEM_HEX).unwrap();
        for name in ["secp256k1.pem", "classpath:secp256k1_sec1.pem"] {
            let identity = resolve(&system(None, Some(name)), SignatureScheme::Ecdsa, &fixtures())
                .unwrap()
                .unwrap();
            assert_eq!(identity.address(), expected.address(), "{name}");
        }
    }

    #[test]
    fn test_sm2_pem() {
        let expected = Identity::from_hex(SignatureScheme::Sm, SM2_PEM_HEX).unwrap();
        let identity = resolve(&system(None, Some("sm2.pem")), SignatureScheme::Sm, &fixtures())
            .unwrap()
            .unwrap();
        assert_eq!(identity.address(), expected.address());
        assert_eq!(identity.scheme(), SignatureScheme::Sm);
    }

    #[test]
    fn test_curve_mismatch_rejected() {
        let pem = std::fs::read(fixtures().locate("sm2.pem").unwrap()).unwrap();
        let err = identity_from_pem(SignatureScheme::Ecdsa, &pem).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn test_missing_or_garbage_pem_is_configuration_error() {
        let err = resolve(&system(None, Some("absent.pem")), SignatureScheme::Ecdsa, &fixtures())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));

        let err = identity_from_pem(SignatureScheme::Ecdsa, b"not a pem").unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_raw_key() {
        let rendered = format!("{:?}", SecretSource::RawKey(OTHER_KEY.to_string()));
        assert!(!rendered.contains(OTHER_KEY));
    }
}
