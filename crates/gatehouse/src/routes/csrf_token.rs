//! CSRF token issuance endpoint.

use axum::{Json, extract::State, http::header, response::IntoResponse};

use tollgate_common::CsrfTokenResponse;

use crate::csrf;
use crate::state::AppState;

/// `GET /csrf-token`: sets the HttpOnly cookie and returns the same token
pub async fn issue_token(State(state): State<AppState>) -> impl IntoResponse {
    let token = csrf::generate_token();
    let cookie = csrf::set_cookie_value(&token, state.config.csrf.secure_cookie);

    tracing::debug!("Issued CSRF token");

    (
        [
            (header::SET_COOKIE, cookie),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Json(CsrfTokenResponse {
            success: true,
            token,
        }),
    )
}
