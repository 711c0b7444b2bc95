//! Signing identity subsystem.
//!
//! # Data Flow
//! ```text
//! system.encrypt_type → scheme.rs (ECDSA/secp256k1+keccak256 or SM2+SM3)
//! system.private_key | system.private_key_pem
//!     → resolver.rs (pick one source, load PEM from the resource path)
//!     → keys.rs (derive public key + address, sign digests)
//!     → Arc<Identity> shared by dispatchers and contract handles
//! ```
//!
//! # Design Decisions
//! - The scheme is passed explicitly; there is no process-wide crypto mode
//! - A missing identity is only fatal when something tries to sign

pub mod keys;
pub mod resolver;
pub mod scheme;

pub use keys::{Identity, TransactionSignature};
pub use resolver::{resolve, SecretSource};
pub use scheme::SignatureScheme;
