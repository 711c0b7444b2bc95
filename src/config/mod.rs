//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, environment overrides)
//!     → validation.rs (semantic checks)
//!     → LedgerConfig (validated, immutable)
//!     → resources.rs resolves TLS/key resource names at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod resources;
pub mod schema;
pub mod validation;

pub use resources::ResourceResolver;
pub use schema::ChannelConfig;
pub use schema::LedgerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ResourceConfig;
pub use schema::SystemConfig;
