//! # Tollgate solver
//!
//! Client side of the Tollgate proof-of-work exchange:
//!
//! - [`solver`]: bounded, cancellable search for a qualifying number
//! - [`client`]: HTTP client for a Gatehouse instance (CSRF, challenge, verify)
//! - [`flow`]: the composite login flow state machine with an explicit
//!   failure policy
//! - [`bridge`]: request-id keyed dispatch for third-party CAPTCHA widget events

pub mod bridge;
pub mod client;
pub mod error;
pub mod flow;
pub mod solver;

pub use error::{ClientError, SolveError};
pub use tokio_util::sync::CancellationToken;
