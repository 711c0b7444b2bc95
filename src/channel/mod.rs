//! Channel subsystem: mutually authenticated connections to ledger nodes.
//!
//! # Data Flow
//! ```text
//! system.node_str
//!     → endpoint.rs (parse "tag@host:port;..." into endpoints)
//!     → tls.rs (CA + node cert + node key → ChannelConnectionSet)
//!     → pool.rs (one supervisor per endpoint)
//!         → connection.rs (TLS dial, reader/writer tasks, heartbeat)
//!         → state.rs (Idle → Connecting → Connected ⇄ Disconnected)
//!     → request: round-robin over live connections
//!         → message.rs (length-prefixed frames correlated by seq)
//! ```
//!
//! # Design Decisions
//! - Connection handles never leave the crate; callers see the pool only
//! - One live endpoint is enough for the pool to be usable
//! - Reconnection is the supervisor's job; requests are never retried

pub mod connection;
pub mod endpoint;
pub mod message;
pub mod pool;
pub mod state;
pub mod tls;

pub use endpoint::{parse_node_list, Endpoint};
pub use message::{ChannelMessage, MessageType};
pub use pool::ConnectionPool;
pub use state::{EndpointState, EndpointStatus};
pub use tls::{ChannelConnectionSet, TlsMaterial};
