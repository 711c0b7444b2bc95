//! Ledger protocol constants and JSON-RPC types.

use alloy::primitives::{Address, Bytes, TxHash, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chain id stamped into every transaction.
pub const CHAIN_ID: u64 = 1;

/// Blocks after the current height a transaction stays valid for.
pub const BLOCK_LIMIT_DELTA: u64 = 500;

/// Receipt status reported for successful execution.
pub const STATUS_OK: &str = "0x0";

/// JSON-RPC method names understood by ledger nodes.
pub mod methods {
    pub const GET_BLOCK_NUMBER: &str = "getBlockNumber";
    pub const GET_CLIENT_VERSION: &str = "getClientVersion";
    pub const GET_TRANSACTION_COUNT: &str = "getTransactionCount";
    pub const GET_TRANSACTION_RECEIPT: &str = "getTransactionReceipt";
    pub const SEND_RAW_TRANSACTION: &str = "sendRawTransaction";
    pub const CALL: &str = "call";
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
    pub id: u64,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Receipt of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: U64,
    pub status: String,
    #[serde(default)]
    pub gas_used: Option<U256>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub output: Option<Bytes>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Address of a newly deployed contract; `None` for calls and for the
    /// all-zero placeholder nodes report on non-deploy receipts.
    pub fn deployed_address(&self) -> Option<Address> {
        self.contract_address.filter(|a| !a.is_zero())
    }
}

/// Result of a read-only `call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutput {
    pub current_block_number: U64,
    pub output: Bytes,
    pub status: String,
}

impl CallOutput {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}
