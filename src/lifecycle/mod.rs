//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Endpoints + TLS material → Identity
//!         → Start pool → Client → Dispatcher → Contract factory
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Supervisors stop → Connections close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: offline checks first, network last
//! - Shutdown is broadcast; every supervisor subscribes before it is spawned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::LedgerContext;
