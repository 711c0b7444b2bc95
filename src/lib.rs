//! Ledger channel client library.
//!
//! Connects to a group of ledger nodes over mutually authenticated TLS
//! channels, resolves the caller's signing identity, and signs and submits
//! transactions with a fixed chain id, group id and gas policy.
//!
//! # Architecture Overview
//!
//! ```text
//!   config ──▶ channel::endpoint ──▶ channel::tls ──▶ channel::pool ──▶ ledger::client
//!     │                                                                   │
//!     └──▶ identity::resolver ──▶ Identity ──┐                            │
//!                                            ▼                            ▼
//!                         ledger::gas ──▶ ledger::dispatcher ◀────────────┘
//!                                            │
//!                                            ▼
//!                                   ledger::contract
//! ```

// Core subsystems
pub mod channel;
pub mod config;
pub mod identity;
pub mod ledger;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use lifecycle::{LedgerContext, Shutdown};
