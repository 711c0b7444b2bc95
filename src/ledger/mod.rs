//! Ledger access subsystem.
//!
//! # Data Flow
//! ```text
//! ContractFactory / business code
//!     → dispatcher.rs (nonce, block limit, gas policy, chain/group id)
//!     → transaction.rs (RLP encode, sign under the identity's scheme)
//!     → client.rs (sendRawTransaction, poll getTransactionReceipt)
//!     → channel pool (RPC frames over mutual TLS)
//! ```
//!
//! # Design Decisions
//! - Chain id is fixed at 1; the group id comes from configuration
//! - Every JSON-RPC call except getClientVersion carries the group id first
//! - Gas price and limit are fixed per dispatcher, never estimated

pub mod client;
pub mod contract;
pub mod dispatcher;
pub mod gas;
pub mod transaction;
pub mod types;

pub use client::LedgerClient;
pub use contract::{ContractFactory, ContractHandle};
pub use dispatcher::TransactionDispatcher;
pub use gas::GasPolicy;
pub use transaction::{RawTransaction, SignedTransaction};
pub use types::{CallOutput, TransactionReceipt, CHAIN_ID};
