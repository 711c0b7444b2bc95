//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! channel, ledger and identity code produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → whatever metrics recorder the host process installs
//! ```

pub mod logging;
pub mod metrics;
