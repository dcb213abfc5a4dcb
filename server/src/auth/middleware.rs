//! Authentication extractor.
//!
//! Reads `Authorization: Bearer <token>`. Without `AUTH_SECRET` the token is
//! the user ID itself, which keeps local development free of a login step.
//! With it, the token must name an unexpired row in `sessions`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use binder_engine::UserId;

use crate::db;
use crate::error::{AppError, AuthFailure};
use crate::AppState;

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Owner of the rows this request may touch
    pub user_id: UserId,
}

/// Pull the bearer token out of the header value.
fn bearer_token(header: Option<&str>) -> Result<&str, AuthFailure> {
    let header = header.ok_or(AuthFailure::NotAuthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthFailure::InvalidSession)?
        .trim();
    if token.is_empty() {
        return Err(AuthFailure::InvalidSession);
    }
    Ok(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header).map_err(AppError::Unauthorized)?;

        if !state.config.validates_sessions() {
            return Ok(AuthUser {
                user_id: token.to_string(),
            });
        }

        match db::find_session_user(&state.pool, token).await? {
            Some(user_id) => Ok(AuthUser { user_id }),
            None => Err(AppError::Unauthorized(AuthFailure::InvalidSession)),
        }
    }
}
