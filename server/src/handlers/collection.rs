//! Collection handlers - read and replace one user's rows.

use binder_engine::wire::{CollectionResponse, ReplaceRequest, ReplaceResponse};
use sqlx::PgPool;

use crate::db;
use crate::error::Result;
use crate::websocket::{collection_changed, ConnectionManager};

/// Return every row of a user.
pub async fn handle_fetch(pool: &PgPool, user_id: &str) -> Result<CollectionResponse> {
    let rows = db::fetch_rows(pool, user_id).await?;

    tracing::debug!(user_id = %user_id, rows = rows.len(), "Served collection");
    Ok(CollectionResponse { rows })
}

/// Replace a user's rows and notify their open connections.
pub async fn handle_replace(
    pool: &PgPool,
    conn_manager: &ConnectionManager,
    user_id: &str,
    request: ReplaceRequest,
) -> Result<ReplaceResponse> {
    let rows = db::normalize_rows(request.rows)?;
    let updated_at = db::replace_rows(pool, user_id, &rows).await?;

    let notified = conn_manager.notify_user(user_id, collection_changed(rows.len(), updated_at));
    tracing::info!(
        user_id = %user_id,
        rows = rows.len(),
        notified = notified,
        "Collection replaced"
    );

    Ok(ReplaceResponse {
        card_count: rows.len(),
        updated_at,
    })
}
