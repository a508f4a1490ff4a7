//! Proof-of-work protocol primitives.
//!
//! Both sides of the exchange go through these functions so the byte order
//! of every hashed input is defined in exactly one place:
//!
//! ```text
//! signature = base64url(HMAC-SHA256(secret, challenge || action || salt))
//! work      = hex(SHA-256(salt || challenge || decimal(number)))
//! ```
//!
//! A salt may carry a signed expiry as a query suffix, e.g.
//! `Zk3c...Q?expires=1767225600`. Since the whole salt is HMAC input, the
//! expiry cannot be altered without breaking the signature.
//!
//! The MAC input has no field separators, so the shapes of `action` and
//! `salt` are fixed: actions never contain `?`, and a salt is exactly the
//! random part optionally followed by `?expires=<digits>`. Bytes cannot
//! move between the two fields without one of them losing its shape.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::{EXPIRES_PARAM, MAX_ACTION_LEN, SALT_BYTES};
use crate::error::GateError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the challenge signature
pub fn sign(secret: &[u8], challenge: &str, action: &str, salt: &str) -> Result<String, GateError> {
    let mac = keyed_mac(secret, challenge, action, salt)?;
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Recompute the signature and compare it to `signature` in constant time.
///
/// Undecodable signatures are a plain mismatch.
pub fn signature_matches(
    secret: &[u8],
    challenge: &str,
    action: &str,
    salt: &str,
    signature: &str,
) -> Result<bool, GateError> {
    let Ok(submitted) = URL_SAFE_NO_PAD.decode(signature) else {
        return Ok(false);
    };

    let expected = keyed_mac(secret, challenge, action, salt)?
        .finalize()
        .into_bytes();

    if submitted.len() != expected.len() {
        return Ok(false);
    }
    Ok(expected.as_slice().ct_eq(submitted.as_slice()).into())
}

fn keyed_mac(
    secret: &[u8],
    challenge: &str,
    action: &str,
    salt: &str,
) -> Result<HmacSha256, GateError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| GateError::Config(format!("invalid HMAC secret: {}", e)))?;
    mac.update(challenge.as_bytes());
    mac.update(action.as_bytes());
    mac.update(salt.as_bytes());
    Ok(mac)
}

/// Hex SHA-256 digest of `salt || challenge || number`
pub fn solution_hash(salt: &str, challenge: &str, number: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(challenge.as_bytes());
    hasher.update(number.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// True when `hash` starts with at least `difficulty` `'0'` hex characters
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Hex digest length of SHA-256; no difficulty above this can be met
pub const MAX_DIFFICULTY: usize = 64;

/// Constant-time string equality (lengths are not secret)
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Append the expiry parameter to a random salt
pub fn salt_with_expiry(random: &str, expires_at: Option<i64>) -> String {
    match expires_at {
        Some(ts) => format!("{}?{}={}", random, EXPIRES_PARAM, ts),
        None => random.to_string(),
    }
}

/// Length of the random salt part: base64url of `SALT_BYTES`, no padding
pub const SALT_RANDOM_LEN: usize = (SALT_BYTES * 4).div_ceil(3);

/// True for 1 to `MAX_ACTION_LEN` characters of `[A-Za-z0-9_-]`
pub fn is_valid_action(action: &str) -> bool {
    !action.is_empty() && action.len() <= MAX_ACTION_LEN && action.bytes().all(is_base64url)
}

fn is_base64url(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Extract the signed expiry (unix seconds) from a salt.
///
/// `Ok(None)` means the salt carries no expiry. Anything other than
/// `<random>` or `<random>?expires=<digits>` is an error.
pub fn salt_expiry(salt: &str) -> Result<Option<i64>, GateError> {
    let (random, query) = match salt.split_once('?') {
        Some((random, query)) => (random, Some(query)),
        None => (salt, None),
    };

    if random.len() != SALT_RANDOM_LEN || !random.bytes().all(is_base64url) {
        return Err(GateError::Validation("malformed salt".into()));
    }

    let Some(query) = query else {
        return Ok(None);
    };

    let value = query
        .strip_prefix(EXPIRES_PARAM)
        .and_then(|rest| rest.strip_prefix('='))
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| GateError::Validation(format!("bad salt suffix: {}", query)))?;

    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| GateError::Validation(format!("bad expiry in salt: {}", value)))
}
