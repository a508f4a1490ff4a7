//! Shared constants for Tollgate components.

/// Hash algorithm identifier carried in every challenge
pub const ALGORITHM: &str = "SHA-256";

/// Action label used when the caller does not supply one
pub const DEFAULT_ACTION: &str = "login";

/// Longest accepted action label
pub const MAX_ACTION_LEN: usize = 32;

/// Leading `'0'` hex characters required when a challenge does not say otherwise
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Largest candidate number a solver is asked to try
pub const DEFAULT_MAX_NUMBER: u64 = 1_000_000;

/// Random bytes in a challenge token
pub const CHALLENGE_BYTES: usize = 32;

/// Random bytes in a salt
pub const SALT_BYTES: usize = 16;

/// Random bytes in a CSRF token (hex encoded, so 64 chars on the wire)
pub const CSRF_TOKEN_BYTES: usize = 32;

/// Default challenge validity (5 minutes)
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;

/// Salt query parameter carrying the signed expiry timestamp
pub const EXPIRES_PARAM: &str = "expires";

/// Default Gatehouse HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";

/// Default per-call network deadline for clients and the siteverify bridge
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 5;

/// Default third-party CAPTCHA siteverify endpoint
pub const DEFAULT_SITEVERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// HTTP paths served by Gatehouse
pub mod paths {
    pub const CHALLENGE: &str = "/challenge";
    pub const VERIFY: &str = "/verify";
    pub const CSRF_TOKEN: &str = "/csrf-token";
    pub const VERIFY_CAPTCHA: &str = "/verify-captcha";
    pub const HEALTH: &str = "/health";
}

/// HTTP header names
pub mod headers {
    /// CSRF token echoed back by the client (double-submit)
    pub const X_CSRF_TOKEN: &str = "x-csrf-token";
}

/// Cookie names
pub mod cookies {
    /// HttpOnly CSRF cookie
    pub const CSRF_TOKEN: &str = "csrf-token";
}

/// Environment variables holding secrets
pub mod env {
    /// HMAC key for challenge signatures
    pub const HMAC_SECRET: &str = "TOLLGATE_HMAC_SECRET";

    /// Third-party CAPTCHA secret for siteverify calls
    pub const CAPTCHA_SECRET: &str = "TOLLGATE_CAPTCHA_SECRET";
}
