//! Challenge issuance endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderName, header},
};

use tollgate_common::constants::DEFAULT_ACTION;
use tollgate_common::{ChallengeRequest, ChallengeResponse, GateError};

use crate::error::ApiError;
use crate::state::AppState;

type ChallengeReply = ([(HeaderName, &'static str); 1], Json<ChallengeResponse>);

/// `GET /challenge`: challenge for the default action
pub async fn get_challenge(State(state): State<AppState>) -> Result<ChallengeReply, ApiError> {
    issue(&state, DEFAULT_ACTION)
}

/// `POST /challenge`: body `{ "action"?: string }`, empty body allowed
pub async fn post_challenge(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ChallengeReply, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ChallengeRequest::default()
    } else {
        serde_json::from_slice::<ChallengeRequest>(&body)
            .map_err(|e| GateError::Validation(format!("invalid challenge request: {}", e)))?
    };

    let action = request.action.unwrap_or_else(|| DEFAULT_ACTION.to_string());
    issue(&state, &action)
}

fn issue(state: &AppState, action: &str) -> Result<ChallengeReply, ApiError> {
    let challenge = state.issuer.issue(action)?;

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(ChallengeResponse {
            success: true,
            challenge,
        }),
    ))
}
