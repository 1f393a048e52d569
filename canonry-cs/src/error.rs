//! Error types for canonry-cs
//!
//! Every failure leaves the service as `{"error": {"code", "message"}}` with
//! a stable code so clients can show the precise reason.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use canonry_common::Error;
use serde_json::json;
use thiserror::Error as ThisError;
use tracing::{error, warn};

/// API error type
#[derive(Debug, ThisError)]
pub enum ApiError {
    /// Domain or store failure from canonry-common
    #[error(transparent)]
    Domain(#[from] Error),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No curator identity on a curator-only route (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ApiError {
    /// HTTP status and stable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Domain(err) => match err {
                Error::NotFound(_) => (StatusCode::NOT_FOUND, err.code()),
                Error::Validation(_) => (StatusCode::BAD_REQUEST, err.code()),
                Error::ImmutableTarget(_)
                | Error::DuplicateEdge { .. }
                | Error::TerminalState { .. }
                | Error::ConcurrentPromotion { .. }
                | Error::DuplicateSlug(_)
                | Error::WorkHasHistory(_) => (StatusCode::CONFLICT, err.code()),
                Error::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, err.code()),
                Error::Config(_) | Error::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Domain(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => msg.clone(),
        };

        if status.is_server_error() {
            error!(code, "Request failed: {}", message);
        } else if status == StatusCode::CONFLICT {
            warn!(code, "Request rejected: {}", message);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
