//! Client-side error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from the proof-of-work search
#[derive(Debug, Error)]
pub enum SolveError {
    /// Ceiling reached without a qualifying number
    #[error("could not solve within {attempts} attempts")]
    Exhausted { attempts: u64 },

    #[error("solve cancelled")]
    Cancelled,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// More leading zeros than a SHA-256 hex digest has
    #[error("difficulty {0} can never be met")]
    InvalidDifficulty(usize),

    /// Blocking worker panicked or was aborted
    #[error("solver worker failed: {0}")]
    Worker(String),
}

/// Errors from talking to a Gatehouse instance
#[derive(Debug, Error)]
pub enum ClientError {
    /// Per-call deadline exceeded
    #[error("{endpoint} timed out after {after:?}")]
    Timeout {
        endpoint: &'static str,
        after: Duration,
    },

    /// Connection or transport failure
    #[error("network error calling {endpoint}: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with `success: false`
    #[error("{endpoint} rejected the request ({status}): {message}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    /// Unparsable response body
    #[error("invalid response from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error("cancelled")]
    Cancelled,

    /// Third-party CAPTCHA widget reported a problem
    #[error("CAPTCHA widget: {0}")]
    Widget(String),
}

impl ClientError {
    /// Returns true if the same call might succeed when repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Reason label for logs and the `Failed` flow state
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network { .. } => "network",
            Self::Rejected { status: 403, .. } => "csrf",
            Self::Rejected { .. } => "rejected",
            Self::Decode { .. } => "decode",
            Self::Solve(SolveError::Exhausted { .. }) => "exhausted",
            Self::Solve(_) => "solve",
            Self::Cancelled => "cancelled",
            Self::Widget(_) => "widget",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let timeout = ClientError::Timeout {
            endpoint: "/verify",
            after: Duration::from_secs(5),
        };
        assert_eq!(timeout.kind(), "timeout");
        assert!(timeout.is_retryable());

        let csrf = ClientError::Rejected {
            endpoint: "/verify",
            status: 403,
            message: "Invalid CSRF token".into(),
        };
        assert_eq!(csrf.kind(), "csrf");
        assert!(!csrf.is_retryable());

        let exhausted = ClientError::from(SolveError::Exhausted { attempts: 10 });
        assert_eq!(exhausted.kind(), "exhausted");
        assert_eq!(exhausted.to_string(), "could not solve within 10 attempts");
    }
}
