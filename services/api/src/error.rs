//! Custom error types for the API service

use auth::{AuthError, models::Permission};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable credential
    #[error("{0}")]
    Unauthorized(String),

    /// Valid credential lacking every required permission
    #[error("Insufficient permissions")]
    Forbidden { required: Vec<Permission> },

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Internal server error. The detail is logged, never returned.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingSessionToken => ApiError::BadRequest(error.to_string()),
            AuthError::Unauthenticated | AuthError::InvalidCredentials => {
                ApiError::Unauthorized(error.to_string())
            }
            AuthError::Forbidden { required } => ApiError::Forbidden { required },
            AuthError::NotFound(message) => ApiError::NotFound(message),
            AuthError::Conflict(message) => ApiError::Conflict(message),
            AuthError::Validation(message) => ApiError::BadRequest(message),
            AuthError::Storage(_) | AuthError::Crypto(_) | AuthError::Internal(_) => {
                ApiError::Internal(error.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": message }))
            }
            ApiError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "Insufficient permissions",
                    "required": required,
                }),
            ),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, json!({ "error": message })),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
