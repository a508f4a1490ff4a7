//! Proof-of-work verification endpoint.

use axum::{Json, body::Bytes, extract::State};

use tollgate_common::{GateError, VerificationResult, VerifyRequest};

use crate::csrf::CsrfGuard;
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /verify`
///
/// Returns:
/// - 200: `{success: true}`
/// - 400: malformed payload, or any verification check failed (generic message)
/// - 403: CSRF cookie/header missing or different
/// - 500: server has no HMAC secret
pub async fn verify_solution(
    State(state): State<AppState>,
    _csrf: CsrfGuard,
    body: Bytes,
) -> Result<Json<VerificationResult>, ApiError> {
    let request: VerifyRequest = serde_json::from_slice(&body)
        .map_err(|e| GateError::Validation(format!("invalid verify body: {}", e)))?;
    let payload = request.into_payload()?;

    state.verifier.verify(&payload)?;

    Ok(Json(VerificationResult::ok()))
}
