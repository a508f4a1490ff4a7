//! Configuration management for Gatehouse.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use tollgate_common::constants::{
    self, DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_DIFFICULTY, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_NUMBER,
    DEFAULT_NETWORK_TIMEOUT_SECS, DEFAULT_SITEVERIFY_URL,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Per-request handling deadline in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins (empty = any origin, without credentials)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Proof-of-work configuration
    #[serde(default)]
    pub pow: PowConfig,

    /// CSRF cookie configuration
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Third-party CAPTCHA configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Secrets, read from the environment only
    #[serde(skip)]
    pub secrets: Secrets,
}

/// Proof-of-work settings
#[derive(Debug, Clone, Deserialize)]
pub struct PowConfig {
    /// Leading `'0'` hex characters required of a solution hash
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,

    /// Largest number advertised to solvers
    #[serde(default = "default_max_number")]
    pub max_number: u64,

    /// Challenge validity in seconds (0 = challenges never expire)
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_secs: u64,

    /// Reject payloads that carry no solution
    #[serde(default = "default_true")]
    pub require_solution: bool,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            max_number: default_max_number(),
            challenge_ttl_secs: default_challenge_ttl(),
            require_solution: true,
        }
    }
}

/// CSRF cookie settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrfConfig {
    /// Add the `Secure` attribute (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookie: bool,
}

/// Third-party CAPTCHA settings
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Siteverify endpoint
    #[serde(default = "default_siteverify_url")]
    pub siteverify_url: String,

    /// Siteverify call deadline in seconds
    #[serde(default = "default_network_timeout")]
    pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            siteverify_url: default_siteverify_url(),
            timeout_secs: default_network_timeout(),
        }
    }
}

/// Server-held secrets
#[derive(Clone, Default)]
pub struct Secrets {
    pub hmac_secret: Option<String>,
    pub captcha_secret: Option<String>,
}

impl Secrets {
    /// Read secrets from the process environment; empty values count as unset
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            hmac_secret: read(constants::env::HMAC_SECRET),
            captcha_secret: read(constants::env::CAPTCHA_SECRET),
        }
    }

    pub fn has_hmac_secret(&self) -> bool {
        self.hmac_secret.is_some()
    }

    pub fn has_captcha_secret(&self) -> bool {
        self.captcha_secret.is_some()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("hmac_secret", &redact(&self.hmac_secret))
            .field("captcha_secret", &redact(&self.captcha_secret))
            .finish()
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_request_timeout() -> u64 { 10 }
fn default_difficulty() -> usize { DEFAULT_DIFFICULTY }
fn default_max_number() -> u64 { DEFAULT_MAX_NUMBER }
fn default_challenge_ttl() -> u64 { DEFAULT_CHALLENGE_TTL_SECS }
fn default_siteverify_url() -> String { DEFAULT_SITEVERIFY_URL.to_string() }
fn default_network_timeout() -> u64 { DEFAULT_NETWORK_TIMEOUT_SECS }
fn default_true() -> bool { true }

impl AppConfig {
    /// Load configuration from file, with CLI overrides and env secrets
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(difficulty) = args.difficulty {
            config.pow.difficulty = difficulty;
        }

        config.secrets = Secrets::from_env();
        config.validate()?;

        Ok(config)
    }

    /// Reject settings no client could ever satisfy
    pub fn validate(&self) -> Result<()> {
        if self.pow.difficulty > tollgate_common::protocol::MAX_DIFFICULTY {
            anyhow::bail!(
                "pow.difficulty {} exceeds the {}-char digest",
                self.pow.difficulty,
                tollgate_common::protocol::MAX_DIFFICULTY
            );
        }
        if self.pow.max_number == 0 {
            anyhow::bail!("pow.max_number must be positive");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout(),
            cors_origins: Vec::new(),
            pow: PowConfig::default(),
            csrf: CsrfConfig::default(),
            captcha: CaptchaConfig::default(),
            secrets: Secrets::default(),
        }
    }
}
