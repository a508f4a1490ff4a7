//! Health check endpoint.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// HMAC secret configured (challenge/verify usable)
    pow_ready: bool,
    /// CAPTCHA secret configured (siteverify usable)
    captcha_ready: bool,
}

/// Basic health check (is the server running, is it configured?)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pow_ready: state.config.secrets.has_hmac_secret(),
        captcha_ready: state.config.secrets.has_captcha_secret(),
    })
}
