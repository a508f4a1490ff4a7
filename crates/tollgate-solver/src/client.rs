//! HTTP client for a Gatehouse instance.
//!
//! Keeps a cookie jar so the HttpOnly CSRF cookie set by `/csrf-token` rides
//! along on later requests, and echoes the token from the JSON body in the
//! `x-csrf-token` header.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tollgate_common::constants::{DEFAULT_NETWORK_TIMEOUT_SECS, headers, paths};
use tollgate_common::{
    CaptchaVerifyRequest, Challenge, ChallengeRequest, ChallengeResponse, CsrfTokenResponse,
    VerificationResult, VerifyPayload,
};

use crate::error::ClientError;

/// Gatehouse client
pub struct GateClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    csrf_token: Option<String>,
}

impl GateClient {
    /// Client with the default per-call deadline
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_NETWORK_TIMEOUT_SECS))
    }

    /// `timeout` bounds each call, from sending the request to reading the body
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("tollgate-solver/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            csrf_token: None,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Token from the last `/csrf-token` call
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the CSRF header when a token is known
    fn guarded(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.csrf_token {
            Some(token) => request.header(headers::X_CSRF_TOKEN, token),
            None => request,
        }
    }

    /// `GET /csrf-token`; stores the token for later calls
    pub async fn fetch_csrf_token(&mut self) -> Result<String, ClientError> {
        let request = self.http.get(self.url(paths::CSRF_TOKEN));
        let reply: CsrfTokenResponse = self.call(paths::CSRF_TOKEN, request).await?;

        if !reply.success || reply.token.is_empty() {
            return Err(ClientError::Decode {
                endpoint: paths::CSRF_TOKEN,
                message: "no token in response".to_string(),
            });
        }

        tracing::debug!("CSRF token acquired");
        self.csrf_token = Some(reply.token.clone());
        Ok(reply.token)
    }

    /// `POST /challenge` for `action`
    pub async fn fetch_challenge(&self, action: &str) -> Result<Challenge, ClientError> {
        let body = ChallengeRequest {
            action: Some(action.to_string()),
        };
        let request = self.http.post(self.url(paths::CHALLENGE)).json(&body);
        let reply: ChallengeResponse = self.call(paths::CHALLENGE, request).await?;

        if !reply.success {
            return Err(ClientError::Rejected {
                endpoint: paths::CHALLENGE,
                status: StatusCode::OK.as_u16(),
                message: "challenge not issued".to_string(),
            });
        }

        tracing::debug!(
            action = %reply.challenge.action,
            difficulty = ?reply.challenge.difficulty,
            "Challenge received"
        );
        Ok(reply.challenge)
    }

    /// `POST /verify`
    pub async fn verify(&self, payload: &VerifyPayload) -> Result<(), ClientError> {
        let request = self.guarded(self.http.post(self.url(paths::VERIFY)).json(payload));
        let reply: VerificationResult = self.call(paths::VERIFY, request).await?;
        accepted(paths::VERIFY, reply)
    }

    /// `POST /verify-captcha` with a widget response token
    pub async fn verify_captcha(&self, token: &str) -> Result<(), ClientError> {
        let body = CaptchaVerifyRequest {
            token: Some(token.to_string()),
        };
        let request = self.guarded(self.http.post(self.url(paths::VERIFY_CAPTCHA)).json(&body));
        let reply: VerificationResult = self.call(paths::VERIFY_CAPTCHA, request).await?;
        accepted(paths::VERIFY_CAPTCHA, reply)
    }

    /// Send under the deadline and decode a JSON body.
    ///
    /// Non-2xx answers become `Rejected` with the server's `error` message.
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout {
                endpoint,
                after: self.timeout,
            })?
            .map_err(|source| ClientError::Network { endpoint, source })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<VerificationResult>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(ClientError::Rejected {
                endpoint,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}

fn accepted(endpoint: &'static str, reply: VerificationResult) -> Result<(), ClientError> {
    if reply.success {
        Ok(())
    } else {
        Err(ClientError::Rejected {
            endpoint,
            status: StatusCode::OK.as_u16(),
            message: reply.error.unwrap_or_else(|| "rejected".to_string()),
        })
    }
}
