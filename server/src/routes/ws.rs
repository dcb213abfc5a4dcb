//! WebSocket upgrade route.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};

use crate::auth::AuthUser;
use crate::handlers::websocket::handle_websocket_connection;
use crate::AppState;

/// Create WebSocket routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade_handler))
}

/// GET /ws - Subscribe to change notifications for the caller's rows.
async fn upgrade_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    upgrade: WebSocketUpgrade,
) -> Response {
    let conn_manager = state.conn_manager.clone();
    upgrade.on_upgrade(move |socket| {
        handle_websocket_connection(socket, conn_manager, auth.user_id)
    })
}
