//! Application error type mapping to HTTP status codes.
//!
//! Error bodies are `{ "error": "...", "code": "...", "resetInMinutes"?: n }`.
//! User-facing messages are in Hebrew, matching the product.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use helpin_types::error::{ConversationError, GatewayError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors from the gateway and conversation store.
    Gateway(GatewayError),
    /// Authentication failure.
    Unauthorized(String),
    /// Body could not be parsed.
    BadRequest(String),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::Gateway(e)
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        AppError::Gateway(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_in_minutes: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut reset_in_minutes = None;
        let (status, code, message) = match self {
            AppError::Gateway(GatewayError::Validation(msg)) | AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
            AppError::Gateway(GatewayError::Unauthenticated) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized: Invalid token".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Gateway(GatewayError::RateLimitExceeded {
                reset_in_minutes: minutes,
                max,
            }) => {
                reset_in_minutes = Some(minutes);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    format!("הגעת למגבלה של {max} הודעות. נסה שוב בעוד {minutes} דקות."),
                )
            }
            AppError::Gateway(GatewayError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "לא נמצא".to_string())
            }
            AppError::Gateway(GatewayError::UpstreamUnavailable(msg)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE", msg)
            }
            AppError::Gateway(e @ GatewayError::MidStreamFailure(_))
            | AppError::Gateway(e @ GatewayError::Storage(_)) => {
                tracing::error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: message,
            code,
            reset_in_minutes,
        };
        (status, Json(body)).into_response()
    }
}
