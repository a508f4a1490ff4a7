//! Wire types shared by Gatehouse and its clients.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ACTION;
use crate::error::GateError;
use crate::protocol;

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

/// A signed proof-of-work challenge.
///
/// Issued fresh per request and never stored server-side; verification
/// recomputes the signature from these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Random token (base64url)
    pub challenge: String,

    /// Random salt (base64url), optionally suffixed with `?expires=<unix>`
    pub salt: String,

    /// base64url HMAC-SHA256 over `challenge || action || salt`
    pub signature: String,

    /// Hash algorithm identifier, always `SHA-256`
    pub algorithm: String,

    /// Action label the signature is bound to
    #[serde(default = "default_action")]
    pub action: String,

    /// Leading `'0'` hex characters the solution hash must have
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<usize>,

    /// Largest number the solver should try
    #[serde(default, rename = "maxnumber", skip_serializing_if = "Option::is_none")]
    pub max_number: Option<u64>,
}

/// `GET|POST /challenge` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub challenge: Challenge,
}

/// `POST /challenge` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// A submitted solution: JSON number or its decimal string form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolutionValue {
    Number(u64),
    Text(String),
}

impl SolutionValue {
    /// Parse into the candidate number, `None` if not a non-negative integer
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<u64> for SolutionValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// The flat verification payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayload {
    pub challenge: String,
    pub salt: String,
    pub signature: String,
    pub algorithm: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionValue>,
}

impl VerifyPayload {
    /// Build the payload a client submits for a solved challenge
    pub fn from_challenge(challenge: &Challenge, solution: u64) -> Self {
        Self {
            challenge: challenge.challenge.clone(),
            salt: challenge.salt.clone(),
            signature: challenge.signature.clone(),
            algorithm: challenge.algorithm.clone(),
            action: challenge.action.clone(),
            solution: Some(solution.into()),
        }
    }

    /// Reject payloads with empty required fields, a malformed action or a
    /// non-numeric solution
    pub fn validate(&self) -> Result<(), GateError> {
        let fields = [
            ("challenge", &self.challenge),
            ("salt", &self.salt),
            ("signature", &self.signature),
            ("algorithm", &self.algorithm),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(GateError::Validation(format!("missing field: {}", name)));
            }
        }

        if !protocol::is_valid_action(&self.action) {
            return Err(GateError::Validation(format!("invalid action: {:?}", self.action)));
        }

        if let Some(solution) = &self.solution {
            if solution.as_number().is_none() {
                return Err(GateError::Validation("solution is not a non-negative integer".into()));
            }
        }

        Ok(())
    }
}

/// `POST /verify` request body.
///
/// Accepts either the flat payload or `{ "payload": "<json>" }`, where the
/// inner string is JSON or base64-encoded JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VerifyRequest {
    Wrapped { payload: String },
    Flat(VerifyPayload),
}

impl VerifyRequest {
    /// Unwrap into the flat payload.
    ///
    /// An inner string that is neither JSON nor base64 JSON is `Internal`
    /// (500); well-formed JSON with missing fields is `Validation` (400).
    pub fn into_payload(self) -> Result<VerifyPayload, GateError> {
        match self {
            Self::Flat(payload) => Ok(payload),
            Self::Wrapped { payload } => {
                let value = match serde_json::from_str::<serde_json::Value>(&payload) {
                    Ok(value) => value,
                    Err(_) => {
                        let decoded = STANDARD.decode(payload.trim()).map_err(|_| {
                            GateError::Internal("payload is neither JSON nor base64".into())
                        })?;
                        serde_json::from_slice(&decoded).map_err(|e| {
                            GateError::Internal(format!("unparsable payload JSON: {}", e))
                        })?
                    }
                };

                serde_json::from_value(value)
                    .map_err(|e| GateError::Validation(format!("invalid payload: {}", e)))
            }
        }
    }
}

/// Accept/reject answer returned by verification endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Upstream error codes (third-party CAPTCHA path only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl VerificationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            details: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// `GET /csrf-token` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub success: bool,
    pub token: String,
}

/// `POST /verify-captcha` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptchaVerifyRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Reply from a third-party CAPTCHA siteverify endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteverifyResponse {
    pub success: bool,
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}
