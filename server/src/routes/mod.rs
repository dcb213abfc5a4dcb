//! HTTP route definitions.

mod collection;
mod health;
mod ws;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(collection::routes())
        .merge(ws::routes())
}
