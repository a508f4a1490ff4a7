//! # Tollgate Common
//!
//! Shared types, protocol primitives, and utilities used across Tollgate components.
//!
//! ## Modules
//! - `types` - Wire structures (Challenge, VerifyPayload, VerificationResult, etc.)
//! - `protocol` - Signature, work predicate and salt expiry helpers
//! - `error` - Common error types
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::GateError;
pub use types::*;
