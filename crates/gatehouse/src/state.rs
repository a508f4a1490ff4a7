//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::pow::{ChallengeIssuer, ChallengeVerifier, HmacSecret};
use crate::siteverify::SiteVerifier;

/// Shared application state.
///
/// Everything here is immutable after startup; no request can observe
/// another request's data through it.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Proof-of-work challenge issuer
    pub issuer: Arc<ChallengeIssuer>,

    /// Proof-of-work verifier
    pub verifier: Arc<ChallengeVerifier>,

    /// Third-party CAPTCHA siteverify bridge
    pub siteverify: Arc<SiteVerifier>,
}

impl AppState {
    /// Build the services from configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        let secret = config.secrets.hmac_secret.as_deref().map(HmacSecret::new);

        let issuer = Arc::new(ChallengeIssuer::new(secret.clone(), &config.pow));
        let verifier = Arc::new(ChallengeVerifier::new(secret, &config.pow));

        let http = reqwest::Client::builder()
            .user_agent(concat!("tollgate-gatehouse/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.captcha.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let siteverify = Arc::new(SiteVerifier::new(
            http,
            &config.captcha,
            config.secrets.captcha_secret.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            issuer,
            verifier,
            siteverify,
        })
    }
}
