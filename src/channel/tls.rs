//! Mutual-TLS material and the channel connection set.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore};
use std::io::BufReader;
use std::sync::Arc;

use crate::channel::endpoint::{parse_node_list, Endpoint};
use crate::config::{LedgerConfig, ResourceResolver};
use crate::error::{LedgerError, LedgerResult};

/// CA chain, client certificate chain and client key, parsed from PEM.
#[derive(Debug)]
pub struct TlsMaterial {
    ca_certs: Vec<CertificateDer<'static>>,
    client_certs: Vec<CertificateDer<'static>>,
    client_key: PrivateKeyDer<'static>,
}

impl TlsMaterial {
    /// Parse PEM-encoded CA certificate(s), client certificate(s) and client key.
    pub fn from_pem(ca_pem: &[u8], cert_pem: &[u8], key_pem: &[u8]) -> LedgerResult<Self> {
        let ca_certs = parse_certs("CA certificate", ca_pem)?;
        let client_certs = parse_certs("node certificate", cert_pem)?;
        let client_key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
            .map_err(|e| LedgerError::Configuration(format!("node key is not valid PEM: {}", e)))?
            .ok_or_else(|| LedgerError::Configuration("node key holds no private key".to_string()))?;

        Ok(Self {
            ca_certs,
            client_certs,
            client_key,
        })
    }

    /// Load the three materials by resource name.
    pub fn load(resources: &ResourceResolver, config: &LedgerConfig) -> LedgerResult<Self> {
        let names = &config.resources;
        let ca = resources.read(&names.ca_cert)?;
        let cert = resources.read(&names.node_cert)?;
        let key = resources.read(&names.node_key)?;
        Self::from_pem(&ca, &cert, &key)
    }

    /// Build the client TLS configuration presented to every node.
    pub fn client_config(&self) -> LedgerResult<Arc<ClientConfig>> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        for cert in &self.ca_certs {
            roots
                .add(cert.clone())
                .map_err(|e| LedgerError::Configuration(format!("invalid CA certificate: {}", e)))?;
        }
        let verifier = NodeCertVerifier::new(roots, provider.clone())?;

        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| LedgerError::Configuration(format!("TLS protocol setup failed: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_client_auth_cert(self.client_certs.clone(), self.client_key.clone_key())
            .map_err(|e| LedgerError::Configuration(format!("invalid node certificate/key: {}", e)))?;

        Ok(Arc::new(config))
    }
}

fn parse_certs(what: &str, pem: &[u8]) -> LedgerResult<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LedgerError::Configuration(format!("{} is not valid PEM: {}", what, e)))?;
    if certs.is_empty() {
        return Err(LedgerError::Configuration(format!("{} holds no certificate", what)));
    }
    Ok(certs)
}

/// Endpoints plus TLS material for one ledger group.
#[derive(Debug)]
pub struct ChannelConnectionSet {
    group_id: u32,
    endpoints: Vec<Endpoint>,
    tls: TlsMaterial,
}

impl ChannelConnectionSet {
    pub fn new(group_id: u32, endpoints: Vec<Endpoint>, tls: TlsMaterial) -> LedgerResult<Self> {
        if endpoints.is_empty() {
            return Err(LedgerError::Configuration(
                "connection set needs at least one endpoint".to_string(),
            ));
        }
        Ok(Self {
            group_id,
            endpoints,
            tls,
        })
    }

    /// Parse the node list and load TLS material for the configured group.
    pub fn build(config: &LedgerConfig, resources: &ResourceResolver) -> LedgerResult<Self> {
        let endpoints = parse_node_list(&config.system.node_str)?;
        for endpoint in &endpoints {
            tracing::info!(address = %endpoint, "connect address");
        }
        let tls = TlsMaterial::load(resources, config)?;
        Self::new(config.system.group_id, endpoints, tls)
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn tls(&self) -> &TlsMaterial {
        &self.tls
    }
}

/// Verifies the node's chain against the configured CA.
///
/// Node certificates are issued per node, not per host name, so a chain that
/// verifies but does not name the dialled host is accepted.
#[derive(Debug)]
struct NodeCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl NodeCertVerifier {
    fn new(roots: RootCertStore, provider: Arc<CryptoProvider>) -> LedgerResult<Self> {
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| LedgerError::Configuration(format!("cannot build verifier: {}", e)))?;
        Ok(Self { inner })
    }
}

fn is_name_mismatch(error: &rustls::Error) -> bool {
    matches!(
        error,
        rustls::Error::InvalidCertificate(
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
        )
    )
}

impl ServerCertVerifier for NodeCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(e) if is_name_mismatch(&e) => {
                tracing::debug!(server_name = ?server_name, "Node certificate does not name host, chain accepted");
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pem_rejected() {
        let err = TlsMaterial::from_pem(b"", b"", b"").unwrap_err();
        assert!(err.to_string().contains("CA certificate holds no certificate"));
    }

    #[test]
    fn test_missing_resource_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LedgerConfig::default();
        config.system.node_str = "127.0.0.1:20200".to_string();
        let resources = ResourceResolver::new(vec![dir.path().to_path_buf()]);

        let err = ChannelConnectionSet::build(&config, &resources).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
        assert!(err.to_string().contains("ca.crt"));
    }

    #[test]
    fn test_name_mismatch_detection() {
        let err = rustls::Error::InvalidCertificate(CertificateError::NotValidForName);
        assert!(is_name_mismatch(&err));

        let err = rustls::Error::InvalidCertificate(CertificateError::NotValidForNameContext {
            expected: ServerName::try_from("127.0.0.1").unwrap(),
            presented: vec!["DnsName(\"node0.example\")".to_string()],
        });
        assert!(is_name_mismatch(&err));

        let err = rustls::Error::InvalidCertificate(CertificateError::Expired);
        assert!(!is_name_mismatch(&err));
        let err = rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer);
        assert!(!is_name_mismatch(&err));
    }
}
