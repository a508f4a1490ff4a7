//! Common error types for Tollgate components.

use thiserror::Error;

/// Common errors across Tollgate components
#[derive(Debug, Error)]
pub enum GateError {
    /// Missing or invalid server configuration (e.g. no HMAC secret)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete request payload
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Double-submit CSRF check failed
    #[error("CSRF check failed: {0}")]
    Csrf(String),

    /// Signature, algorithm, work or expiry check failed.
    ///
    /// The reason is for logs only and never leaves the server.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Third-party service answered with something unusable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Deadline exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Wrong HTTP method for the endpoint
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::Validation(_) => 400,
            Self::Csrf(_) => 403,
            Self::VerificationFailed(_) => 400,
            Self::Upstream(_) => 502,
            Self::Timeout(_) => 504,
            Self::MethodNotAllowed => 405,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Timeout(_))
    }

    /// Message safe to return to clients.
    ///
    /// Never carries the internal detail, so a failing check cannot be told
    /// apart from another one by its response.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "Server configuration error",
            Self::Validation(_) => "Invalid payload structure",
            Self::Csrf(_) => "Invalid CSRF token",
            Self::VerificationFailed(_) => "Verification failed",
            Self::Upstream(_) => "Upstream verification service error",
            Self::Timeout(_) => "Upstream verification service timed out",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::Internal(_) => "Internal server error",
        }
    }
}
