//! Shared utilities for integration tests: a throwaway PKI and a mock ledger node.

#![allow(dead_code)]

use alloy::hex;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_rustls::TlsAcceptor;

use ledger_channel::channel::ChannelMessage;
use ledger_channel::config::LedgerConfig;
use ledger_channel::identity::SignatureScheme;
use ledger_channel::ledger::SignedTransaction;

/// Error code the mock node returns for a reused (sender, nonce) pair.
pub const NONCE_USED_CODE: i64 = 10000;

/// CA plus one leaf certificate, used by both sides.
pub struct TestPki {
    pub ca_pem: String,
    pub ca_der: CertificateDer<'static>,
    pub node_pem: String,
    pub node_der: CertificateDer<'static>,
    pub node_key_pem: String,
    pub node_key_der: Vec<u8>,
}

impl TestPki {
    /// Leaf certificate valid for 127.0.0.1.
    pub fn generate() -> Self {
        Self::generate_for(&["127.0.0.1"])
    }

    /// Leaf certificate carrying exactly `names` as subject alternative names.
    pub fn generate_for(names: &[&str]) -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "ledger test ca");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let node_key = KeyPair::generate().unwrap();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mut node_params = CertificateParams::new(names).unwrap();
        node_params
            .distinguished_name
            .push(DnType::CommonName, "ledger test node");
        node_params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        node_params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let node_cert = node_params.signed_by(&node_key, &ca_cert, &ca_key).unwrap();

        Self {
            ca_pem: ca_cert.pem(),
            ca_der: ca_cert.der().clone(),
            node_pem: node_cert.pem(),
            node_der: node_cert.der().clone(),
            node_key_pem: node_key.serialize_pem(),
            node_key_der: node_key.serialize_der(),
        }
    }

    /// Write `ca.crt`, `node.crt` and `node.key` into `dir`.
    pub fn write_resources(&self, dir: &Path) {
        std::fs::write(dir.join("ca.crt"), &self.ca_pem).unwrap();
        std::fs::write(dir.join("node.crt"), &self.node_pem).unwrap();
        std::fs::write(dir.join("node.key"), &self.node_key_pem).unwrap();
    }

    fn acceptor(&self) -> TlsAcceptor {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut roots = RootCertStore::empty();
        roots.add(self.ca_der.clone()).unwrap();
        let client_verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                .build()
                .unwrap();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.node_key_der.clone()));
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(vec![self.node_der.clone()], key)
            .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }
}

/// Configuration pointing at `dir` for TLS resources and at `node_str` for nodes.
pub fn ledger_config(dir: &Path, node_str: &str) -> LedgerConfig {
    let mut config = LedgerConfig::default();
    config.system.node_str = node_str.to_string();
    config.system.group_id = 1;
    config.resources.search_paths = vec![dir.to_path_buf()];
    config.channel.connect_secs = 5;
    config.channel.handshake_timeout_ms = 1_000;
    config.channel.request_timeout_ms = 2_000;
    config
}

/// A localhost port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Observable state of a mock node.
#[derive(Default)]
pub struct MockLedger {
    block_number: AtomicU64,
    next_nonce: Mutex<HashMap<Address, U256>>,
    used_nonces: Mutex<HashSet<(Address, U256)>>,
    receipts: Mutex<HashMap<TxHash, Value>>,
    accepted: Mutex<Vec<SignedTransaction>>,
    rpc_requests: AtomicUsize,
    heartbeats: AtomicUsize,
    silent: AtomicBool,
}

impl MockLedger {
    pub fn accepted(&self) -> Vec<SignedTransaction> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn rpc_requests(&self) -> usize {
        self.rpc_requests.load(Ordering::SeqCst)
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    pub fn set_next_nonce(&self, address: Address, nonce: U256) {
        self.next_nonce.lock().unwrap().insert(address, nonce);
    }

    /// While silent the node keeps reading frames but answers none, heartbeats included.
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }
}

/// TLS ledger node speaking the channel frame protocol.
pub struct MockNode {
    pub addr: SocketAddr,
    pub ledger: Arc<MockLedger>,
    listener: JoinHandle<()>,
    connections: Arc<Mutex<Vec<AbortHandle>>>,
}

impl MockNode {
    pub async fn start(pki: &TestPki, scheme: SignatureScheme) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = pki.acceptor();
        let ledger = Arc::new(MockLedger::default());
        let connections = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let ledger = ledger.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((tcp, _)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    let ledger = ledger.clone();
                    let handle = tokio::spawn(async move {
                        if let Ok(stream) = acceptor.accept(tcp).await {
                            serve(stream, ledger, scheme).await;
                        }
                    });
                    connections.lock().unwrap().push(handle.abort_handle());
                }
            })
        };

        Self {
            addr,
            ledger,
            listener: task,
            connections,
        }
    }

    pub fn node_str(&self) -> String {
        format!("node@{}", self.addr)
    }

    /// Connections accepted since start or the last `drop_connections`.
    pub fn accepted_connections(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Drop every open connection but keep accepting new ones.
    pub fn drop_connections(&self) {
        for handle in self.connections.lock().unwrap().drain(..) {
            handle.abort();
        }
    }

    /// Stop accepting and drop every open connection.
    pub fn stop(&self) {
        self.listener.abort();
        for handle in self.connections.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.stop();
    }
}

/// TCP front for a node that holds the first accepted socket open without
/// ever answering, and relays every later connection to `target`.
pub struct StallingFront {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StallingFront {
    pub async fn start(target: SocketAddr) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let task = {
            let accepted = accepted.clone();
            tokio::spawn(async move {
                let mut stalled = Vec::new();
                while let Ok((mut inbound, _)) = listener.accept().await {
                    if accepted.fetch_add(1, Ordering::SeqCst) == 0 {
                        stalled.push(inbound);
                        continue;
                    }
                    tokio::spawn(async move {
                        if let Ok(mut outbound) = TcpStream::connect(target).await {
                            let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                        }
                    });
                }
            })
        };

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub fn node_str(&self) -> String {
        format!("node@{}", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for StallingFront {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<S>(mut stream: S, ledger: Arc<MockLedger>, scheme: SignatureScheme)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    while let Ok(Some(frame)) = ChannelMessage::read_from(&mut stream).await {
        if ledger.silent.load(Ordering::SeqCst) {
            continue;
        }
        let reply = if frame.is_heartbeat() {
            ledger.heartbeats.fetch_add(1, Ordering::SeqCst);
            frame.reply(b"1".to_vec())
        } else {
            ledger.rpc_requests.fetch_add(1, Ordering::SeqCst);
            let body = match serde_json::from_slice::<Value>(&frame.payload) {
                Ok(request) => handle_rpc(&ledger, scheme, &request),
                Err(_) => json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "parse error"}}),
            };
            frame.reply(serde_json::to_vec(&body).unwrap())
        };
        if reply.write_to(&mut stream).await.is_err() {
            break;
        }
    }
}

fn handle_rpc(ledger: &MockLedger, scheme: SignatureScheme, request: &Value) -> Value {
    let id = request["id"].clone();
    let params = &request["params"];
    let result = match request["method"].as_str().unwrap_or_default() {
        "getBlockNumber" => Ok(json!(format!("0x{:x}", ledger.block_number.load(Ordering::SeqCst)))),
        "getClientVersion" => Ok(json!({"FISCO-BCOS Version": "mock", "Chain Id": "1"})),
        "getTransactionCount" => {
            let address: Address = serde_json::from_value(params[1].clone()).unwrap();
            let next = ledger
                .next_nonce
                .lock()
                .unwrap()
                .get(&address)
                .copied()
                .unwrap_or_default();
            Ok(json!(next))
        }
        "sendRawTransaction" => send_raw(ledger, scheme, params),
        "getTransactionReceipt" => {
            let hash: TxHash = serde_json::from_value(params[1].clone()).unwrap();
            Ok(ledger
                .receipts
                .lock()
                .unwrap()
                .get(&hash)
                .cloned()
                .unwrap_or(Value::Null))
        }
        "call" => Ok(json!({
            "currentBlockNumber": format!("0x{:x}", ledger.block_number.load(Ordering::SeqCst)),
            "output": params[1]["data"].clone(),
            "status": "0x0",
        })),
        other => Err((-32601, format!("method {} not found", other))),
    };

    match result {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err((code, message)) => {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
        }
    }
}

fn send_raw(ledger: &MockLedger, scheme: SignatureScheme, params: &Value) -> Result<Value, (i64, String)> {
    let group_id = params[0].as_u64().unwrap_or_default();
    let raw = params[1].as_str().unwrap_or_default().trim_start_matches("0x");
    let bytes = hex::decode(raw).map_err(|e| (-32602, e.to_string()))?;
    let signed = SignedTransaction::decode(&bytes, scheme).map_err(|e| (-32602, e.to_string()))?;
    if u64::from(signed.group_id()) != group_id {
        return Err((10001, "group id mismatch".to_string()));
    }
    let sender = signed.recover_signer().map_err(|e| (10002, e.to_string()))?;

    if !ledger
        .used_nonces
        .lock()
        .unwrap()
        .insert((sender, signed.nonce()))
    {
        return Err((NONCE_USED_CODE, "nonce already used".to_string()));
    }
    ledger
        .next_nonce
        .lock()
        .unwrap()
        .insert(sender, signed.nonce() + U256::from(1));

    let block = ledger.block_number.fetch_add(1, Ordering::SeqCst) + 1;
    let hash = signed.hash();
    let contract_address = match signed.raw().to {
        Some(_) => Address::ZERO,
        None => {
            let mut seed = sender.to_vec();
            seed.extend_from_slice(&signed.nonce().to_be_bytes::<32>());
            Address::from_slice(&keccak256(&seed)[12..])
        }
    };
    let receipt = json!({
        "transactionHash": hash,
        "blockNumber": format!("0x{:x}", block),
        "status": "0x0",
        "gasUsed": "0x5208",
        "from": sender,
        "to": signed.raw().to.unwrap_or(Address::ZERO),
        "contractAddress": contract_address,
        "output": Bytes::new(),
    });
    ledger.receipts.lock().unwrap().insert(hash, receipt);
    ledger.accepted.lock().unwrap().push(signed);
    Ok(json!(hash))
}
