//! Ledger JSON-RPC client over the channel pool.
//!
//! # Responsibilities
//! - Wrap JSON-RPC 2.0 requests in channel RPC frames
//! - Bound every request by the client timeout
//! - Decode results into typed values, node errors into `LedgerError::Rpc`
//! - Poll for receipts after submission

use alloy::hex;
use alloy::primitives::{Address, Bytes, TxHash, U256, U64};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::{ChannelMessage, ConnectionPool};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::types::{methods, CallOutput, RpcRequest, RpcResponse, TransactionReceipt};
use crate::observability::metrics;

/// Per-request timeout used when the channel settings do not override it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    pool: Arc<ConnectionPool>,
    timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl LedgerClient {
    /// Client using the pool's configured request timeout.
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        let timeout = pool.settings().request_timeout();
        Self::with_timeout(pool, timeout)
    }

    pub fn with_timeout(pool: Arc<ConnectionPool>, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn group_id(&self) -> u32 {
        self.pool.group_id()
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Issue a raw JSON-RPC request and return its `result`.
    pub async fn request(&self, method: &'static str, params: Value) -> LedgerResult<Value> {
        let started = Instant::now();
        let result = self.exchange(method, params).await;
        metrics::record_request(method, result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            tracing::debug!(method, error = %e, "Ledger request failed");
        }
        result
    }

    async fn exchange(&self, method: &'static str, params: Value) -> LedgerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_vec(&RpcRequest::new(method, params, id))
            .map_err(|e| LedgerError::Protocol(format!("cannot encode {} request: {}", method, e)))?;

        let reply = self
            .pool
            .request(method, ChannelMessage::rpc(body), self.timeout)
            .await?;
        parse_reply(method, &reply)
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> LedgerResult<T> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| LedgerError::Protocol(format!("unexpected {} result: {}", method, e)))
    }

    pub async fn get_block_number(&self) -> LedgerResult<u64> {
        let number: U64 = self
            .request_as(methods::GET_BLOCK_NUMBER, json!([self.group_id()]))
            .await?;
        Ok(number.to::<u64>())
    }

    /// Node build and version information.
    pub async fn get_client_version(&self) -> LedgerResult<Value> {
        self.request(methods::GET_CLIENT_VERSION, json!([])).await
    }

    /// Next nonce the node expects from `address`.
    pub async fn get_transaction_count(&self, address: Address) -> LedgerResult<U256> {
        self.request_as(
            methods::GET_TRANSACTION_COUNT,
            json!([self.group_id(), address]),
        )
        .await
    }

    /// `None` while the transaction is not yet in a block.
    pub async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> LedgerResult<Option<TransactionReceipt>> {
        self.request_as(
            methods::GET_TRANSACTION_RECEIPT,
            json!([self.group_id(), hash]),
        )
        .await
    }

    /// Execute `data` against `to` without creating a transaction.
    pub async fn call(&self, from: Address, to: Address, data: &Bytes) -> LedgerResult<CallOutput> {
        self.request_as(
            methods::CALL,
            json!([self.group_id(), {"from": from, "to": to, "data": data}]),
        )
        .await
    }

    /// Submit a signed transaction; returns the hash the node assigned.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> LedgerResult<TxHash> {
        self.request_as(
            methods::SEND_RAW_TRANSACTION,
            json!([self.group_id(), hex::encode_prefixed(raw)]),
        )
        .await
    }

    /// Poll until `hash` has a receipt or the request timeout elapses.
    pub async fn wait_for_receipt(&self, hash: TxHash) -> LedgerResult<TransactionReceipt> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(receipt) = self.get_transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            if Instant::now() + RECEIPT_POLL_INTERVAL > deadline {
                tracing::warn!(tx_hash = %hash, "No receipt before timeout");
                return Err(LedgerError::Timeout {
                    operation: "wait_for_receipt",
                    millis: self.timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

/// Unwrap a channel reply into the JSON-RPC `result`.
fn parse_reply(method: &str, reply: &ChannelMessage) -> LedgerResult<Value> {
    if reply.result != 0 {
        return Err(LedgerError::Protocol(format!(
            "node answered {} with channel status {}",
            method, reply.result
        )));
    }

    let response: RpcResponse = serde_json::from_slice(&reply.payload)
        .map_err(|e| LedgerError::Protocol(format!("malformed {} response: {}", method, e)))?;
    if let Some(error) = response.error {
        return Err(LedgerError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}
