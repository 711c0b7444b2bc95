//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connection attempt to a node fails or an open connection drops:
//!     → pool supervisor records the failure
//!     → backoff.rs computes the spacing before the next attempt
//!     → supervisor sleeps (or exits on shutdown) and redials
//! ```
//!
//! # Design Decisions
//! - Only reconnection is retried; requests are never retried here
//! - Every external call has a deadline (connect timeout, request timeout)

pub mod backoff;
