//! Third-party CAPTCHA siteverify bridge.
//!
//! The alternative to proof-of-work: the browser widget hands the client a
//! response token, and we ask the provider whether it is genuine by posting
//! `secret` + `response` as a form to its siteverify endpoint.

use std::time::Duration;

use tollgate_common::{GateError, SiteverifyResponse};

use crate::config::CaptchaConfig;

/// Siteverify client
pub struct SiteVerifier {
    http: reqwest::Client,
    url: String,
    secret: Option<String>,
    timeout: Duration,
}

impl SiteVerifier {
    pub fn new(http: reqwest::Client, config: &CaptchaConfig, secret: Option<String>) -> Self {
        Self {
            http,
            url: config.siteverify_url.clone(),
            secret,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Ask the provider about `token`.
    ///
    /// A reply with `success: false` is returned as `Ok`; only configuration
    /// and transport problems are errors.
    pub async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<SiteverifyResponse, GateError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| GateError::Config("CAPTCHA secret is not set".to_string()))?;

        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let exchange = async {
            let response = self
                .http
                .post(&self.url)
                .form(&form)
                .send()
                .await?
                .error_for_status()?;
            response.json::<SiteverifyResponse>().await
        };

        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GateError::Timeout(format!("siteverify after {:?}", self.timeout)))?
            .map_err(|e| GateError::Upstream(format!("siteverify: {}", e)))?;

        if reply.success {
            tracing::info!(hostname = ?reply.hostname, "CAPTCHA token verified");
        } else {
            tracing::debug!(error_codes = ?reply.error_codes, "CAPTCHA token rejected");
        }

        Ok(reply)
    }
}
