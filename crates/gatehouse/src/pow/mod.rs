//! Proof-of-work challenge issuance and verification.
//!
//! Both halves share one [`HmacSecret`]; nothing else is shared between
//! requests, so any Gatehouse instance holding the same secret can verify a
//! challenge issued by another.

mod issuer;
mod verifier;

pub use issuer::ChallengeIssuer;
pub use verifier::ChallengeVerifier;

use std::fmt;
use std::sync::Arc;

use tollgate_common::GateError;

/// HMAC key material, cheap to clone and redacted in debug output
#[derive(Clone)]
pub struct HmacSecret(Arc<[u8]>);

impl HmacSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HmacSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacSecret(<redacted>)")
    }
}

/// Resolve the secret or fail with the 500 configuration error
fn require_secret(secret: &Option<HmacSecret>) -> Result<&HmacSecret, GateError> {
    secret
        .as_ref()
        .ok_or_else(|| GateError::Config("HMAC secret is not set".to_string()))
}
