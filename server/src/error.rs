//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No credentials were sent
    NotAuthenticated,
    /// Credentials were sent but are unknown, malformed or expired
    InvalidSession,
}

impl AuthFailure {
    /// Error code in the response body, matching the client's sync reasons.
    pub fn code(self) -> &'static str {
        match self {
            AuthFailure::NotAuthenticated => "not_authenticated",
            AuthFailure::InvalidSession => "invalid_session",
        }
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] binder_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {}", .0.code())]
    Unauthorized(AuthFailure),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Engine(e) => {
                // Stored rows that no longer decode are a server-side fault.
                tracing::error!("Engine error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Stored collection is invalid".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Unauthorized(failure) => {
                tracing::debug!(reason = failure.code(), "Rejected unauthenticated request");
                (StatusCode::UNAUTHORIZED, failure.code().to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
