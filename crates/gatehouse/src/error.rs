//! HTTP mapping for [`GateError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tollgate_common::{GateError, VerificationResult};

/// Handler error: renders as `{ "success": false, "error": <public message> }`
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub GateError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self.0 {
            GateError::Config(_) | GateError::Internal(_) => {
                tracing::error!(error = %self.0, "Request failed");
            }
            GateError::VerificationFailed(_) | GateError::Csrf(_) | GateError::Validation(_) => {
                // Detail stays in the log, never in the body
                tracing::debug!(error = %self.0, "Request rejected");
            }
            _ => tracing::warn!(error = %self.0, "Request failed"),
        }

        (status, Json(VerificationResult::failed(self.0.public_message()))).into_response()
    }
}

/// Fallback for routes hit with an unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError(GateError::MethodNotAllowed)
}
