//! Solution verification.

use tollgate_common::constants::ALGORITHM;
use tollgate_common::{GateError, VerifyPayload, protocol};

use super::{HmacSecret, require_secret};
use crate::config::PowConfig;

/// Challenge verifier service
pub struct ChallengeVerifier {
    /// Signing key (None when the server is misconfigured)
    secret: Option<HmacSecret>,
    /// Enforced difficulty; the client-side value is never trusted
    difficulty: usize,
    /// Whether a payload without a solution is malformed
    require_solution: bool,
    /// Whether every salt must carry a signed expiry
    require_expiry: bool,
}

impl ChallengeVerifier {
    pub fn new(secret: Option<HmacSecret>, config: &PowConfig) -> Self {
        Self {
            secret,
            difficulty: config.difficulty,
            require_solution: config.require_solution,
            require_expiry: config.challenge_ttl_secs > 0,
        }
    }

    /// Verify a submitted payload
    ///
    /// Returns:
    /// - `Ok(())`: signature valid, not expired, enough work
    /// - `Config`: no secret configured (500)
    /// - `Validation`: malformed payload (400)
    /// - `VerificationFailed`: any check failed (400, generic message)
    pub fn verify(&self, payload: &VerifyPayload) -> Result<(), GateError> {
        self.verify_at(payload, chrono::Utc::now().timestamp())
    }

    /// Verify as if the current time were `now` (unix seconds)
    pub fn verify_at(&self, payload: &VerifyPayload, now: i64) -> Result<(), GateError> {
        payload.validate()?;

        let number = match (&payload.solution, self.require_solution) {
            (Some(solution), _) => solution.as_number(),
            (None, true) => return Err(GateError::Validation("missing solution".into())),
            (None, false) => None,
        };

        let secret = require_secret(&self.secret)?;

        if payload.algorithm != ALGORITHM {
            return Err(reject(payload, "unsupported algorithm"));
        }

        let signature_ok = protocol::signature_matches(
            secret.as_bytes(),
            &payload.challenge,
            &payload.action,
            &payload.salt,
            &payload.signature,
        )?;
        if !signature_ok {
            return Err(reject(payload, "signature mismatch"));
        }

        // Only trusted once the signature covers the salt
        match protocol::salt_expiry(&payload.salt) {
            Ok(Some(expires_at)) if now > expires_at => {
                return Err(reject(payload, "challenge expired"));
            }
            Ok(None) if self.require_expiry => {
                return Err(reject(payload, "missing expiry"));
            }
            Ok(_) => {}
            Err(_) => return Err(reject(payload, "malformed salt")),
        }

        if let Some(number) = number {
            let hash = protocol::solution_hash(&payload.salt, &payload.challenge, number);
            if !protocol::meets_difficulty(&hash, self.difficulty) {
                return Err(reject(payload, "insufficient work"));
            }
        }

        tracing::info!(action = %payload.action, "Proof-of-work verified");
        Ok(())
    }
}

fn reject(payload: &VerifyPayload, reason: &str) -> GateError {
    tracing::debug!(action = %payload.action, reason = %reason, "Proof-of-work rejected");
    GateError::VerificationFailed(reason.to_string())
}
