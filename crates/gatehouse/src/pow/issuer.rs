//! Challenge issuance.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use tollgate_common::constants::{ALGORITHM, CHALLENGE_BYTES, SALT_BYTES};
use tollgate_common::{Challenge, GateError, protocol};

use super::{HmacSecret, require_secret};
use crate::config::PowConfig;

/// Challenge issuer service
pub struct ChallengeIssuer {
    /// Signing key (None when the server is misconfigured)
    secret: Option<HmacSecret>,
    /// Difficulty advertised in each challenge
    difficulty: usize,
    /// Solver attempt ceiling advertised in each challenge
    max_number: u64,
    /// Challenge validity in seconds, 0 for none
    ttl_secs: u64,
}

impl ChallengeIssuer {
    pub fn new(secret: Option<HmacSecret>, config: &PowConfig) -> Self {
        Self {
            secret,
            difficulty: config.difficulty,
            max_number: config.max_number,
            ttl_secs: config.challenge_ttl_secs,
        }
    }

    /// Issue a fresh challenge bound to `action`
    pub fn issue(&self, action: &str) -> Result<Challenge, GateError> {
        self.issue_at(action, chrono::Utc::now().timestamp())
    }

    /// Issue a challenge as if the current time were `now` (unix seconds)
    pub fn issue_at(&self, action: &str, now: i64) -> Result<Challenge, GateError> {
        if !protocol::is_valid_action(action) {
            return Err(GateError::Validation(format!("invalid action: {:?}", action)));
        }
        let secret = require_secret(&self.secret)?;

        let challenge = random_token::<CHALLENGE_BYTES>();
        let expires_at = (self.ttl_secs > 0).then(|| now + self.ttl_secs as i64);
        let salt = protocol::salt_with_expiry(&random_token::<SALT_BYTES>(), expires_at);
        let signature = protocol::sign(secret.as_bytes(), &challenge, action, &salt)?;

        tracing::debug!(
            action = %action,
            difficulty = self.difficulty,
            expires_at = ?expires_at,
            "Issued proof-of-work challenge"
        );

        Ok(Challenge {
            challenge,
            salt,
            signature,
            algorithm: ALGORITHM.to_string(),
            action: action.to_string(),
            difficulty: Some(self.difficulty),
            max_number: Some(self.max_number),
        })
    }
}

/// Cryptographically random token, base64url without padding
fn random_token<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl_secs: u64) -> ChallengeIssuer {
        let config = PowConfig {
            challenge_ttl_secs: ttl_secs,
            ..Default::default()
        };
        ChallengeIssuer::new(Some(HmacSecret::new("issuer-secret")), &config)
    }

    #[test]
    fn test_issue_shape() {
        let challenge = issuer(0).issue("login").unwrap();
        // 32 bytes -> 43 chars, 16 bytes -> 22 chars (base64url, no padding)
        assert_eq!(challenge.challenge.len(), 43);
        assert_eq!(challenge.salt.len(), 22);
        assert_eq!(challenge.algorithm, "SHA-256");
        assert_eq!(challenge.action, "login");
        assert_eq!(challenge.difficulty, Some(2));

        let expected =
            protocol::sign(b"issuer-secret", &challenge.challenge, "login", &challenge.salt).unwrap();
        assert_eq!(challenge.signature, expected);
    }

    #[test]
    fn test_issue_twice_differs() {
        let issuer = issuer(0);
        let a = issuer.issue("login").unwrap();
        let b = issuer.issue("login").unwrap();
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_issue_embeds_expiry() {
        let challenge = issuer(60).issue_at("signup", 1_000).unwrap();
        assert!(challenge.salt.ends_with("?expires=1060"));
        assert_eq!(protocol::salt_expiry(&challenge.salt).unwrap(), Some(1_060));
    }

    #[test]
    fn test_issue_rejects_unsafe_action() {
        let issuer = issuer(60);
        for action in ["login?x", "", "a b", &"x".repeat(33)] {
            let err = issuer.issue(action).unwrap_err();
            assert_eq!(err.status_code(), 400, "action {:?}", action);
        }
        assert!(issuer.issue("sign-up_2").is_ok());
    }

    #[test]
    fn test_issue_without_secret() {
        let issuer = ChallengeIssuer::new(None, &PowConfig::default());
        let err = issuer.issue("login").unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
