//! Error responses.
//!
//! # Responsibilities
//! - Map rule errors to HTTP status codes
//! - Render every error as `{ "error": message }`, plus `errors` for validation
//! - Turn malformed JSON bodies into 400s
//!
//! # Design Decisions
//! - Client errors are logged at debug, server faults at error
//! - Internal error details are still returned; there is no auth boundary to hide them behind

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::rules::RuleError;

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Rule(RuleError),
    Body(JsonRejection),
}

impl From<RuleError> for ApiError {
    fn from(err: RuleError) -> Self {
        ApiError::Rule(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

/// HTTP status for a rule error.
pub fn status_for(err: &RuleError) -> StatusCode {
    match err {
        RuleError::Validation(_) | RuleError::InvalidName(_) => StatusCode::BAD_REQUEST,
        RuleError::DuplicateName(_) => StatusCode::CONFLICT,
        RuleError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rule(err) => {
                let status = status_for(&err);
                if err.is_client_error() {
                    tracing::debug!(status = %status, error = %err, "Request rejected");
                } else {
                    tracing::error!(status = %status, error = %err, "Request failed");
                }
                let body = match &err {
                    RuleError::Validation(errors) => json!({
                        "error": err.to_string(),
                        "errors": errors,
                    }),
                    _ => json!({ "error": err.to_string() }),
                };
                (status, Json(body)).into_response()
            }
            ApiError::Body(rejection) => {
                let status = match rejection.status() {
                    StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                tracing::debug!(status = %status, error = %rejection.body_text(), "Rejected request body");
                (status, Json(json!({ "error": rejection.body_text() }))).into_response()
            }
        }
    }
}
