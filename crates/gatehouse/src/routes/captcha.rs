//! Third-party CAPTCHA verification endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use tollgate_common::{CaptchaVerifyRequest, GateError, VerificationResult};

use crate::csrf::CsrfGuard;
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /verify-captcha` with body `{ "token": "<widget response>" }`
///
/// Returns:
/// - 200: provider accepted the token
/// - 400: missing token, or provider rejected it (`details` = provider error codes)
/// - 403: CSRF check failed
/// - 500: no CAPTCHA secret configured
/// - 502/504: provider unreachable or too slow
pub async fn verify_captcha(
    State(state): State<AppState>,
    _csrf: CsrfGuard,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<VerificationResult>), ApiError> {
    let request: CaptchaVerifyRequest = serde_json::from_slice(&body)
        .map_err(|e| GateError::Validation(format!("invalid captcha body: {}", e)))?;

    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GateError::Validation("missing CAPTCHA token".to_string()))?;

    let reply = state.siteverify.verify(&token, client_ip(&headers)).await?;

    if reply.success {
        Ok((StatusCode::OK, Json(VerificationResult::ok())))
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(
                VerificationResult::failed("CAPTCHA verification failed")
                    .with_details(reply.error_codes),
            ),
        ))
    }
}

/// First hop of `X-Forwarded-For`, if any
fn client_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
