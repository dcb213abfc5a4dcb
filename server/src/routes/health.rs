//! Liveness and readiness endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Open WebSocket connections
    pub connections: usize,
    /// Users with at least one open connection
    pub subscribed_users: usize,
}

/// Readiness response.
#[derive(Serialize)]
pub struct ReadyResponse {
    pub database: &'static str,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/", get(root))
}

/// GET /health - process is up; never touches the database.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.conn_manager.connection_count(),
        subscribed_users: state.conn_manager.user_count(),
    })
}

/// GET /ready - the collection store answers queries.
async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(ReadyResponse { database: "ok" })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    database: "unavailable",
                }),
            )
        }
    }
}

async fn root() -> &'static str {
    "Binder Server"
}
