//! Collection endpoint routes.

use axum::{extract::State, routing::get, Json, Router};
use binder_engine::wire::{CollectionResponse, ReplaceRequest, ReplaceResponse};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_fetch, handle_replace};
use crate::AppState;

/// Create collection routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/collection", get(fetch_handler).put(replace_handler))
}

/// GET /collection - Every row of the caller.
async fn fetch_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CollectionResponse>> {
    let response = handle_fetch(&state.pool, &auth.user_id).await?;
    Ok(Json(response))
}

/// PUT /collection - Replace the caller's rows with a full snapshot.
async fn replace_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ReplaceRequest>,
) -> Result<Json<ReplaceResponse>> {
    let response =
        handle_replace(&state.pool, &state.conn_manager, &auth.user_id, request).await?;
    Ok(Json(response))
}
