//! Binder Server - remote store for card collections.
//!
//! Keeps one row per (user, card) in PostgreSQL. Clients read and replace
//! their whole collection over HTTP and hold a WebSocket open to hear
//! about writes made from their other tabs and devices.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod routes;
mod websocket;

use crate::config::Config;
use crate::db::Pool;
use crate::websocket::ConnectionManager;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
}

/// Build the router with its layers.
fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "binder_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Binder Server on {}:{}", config.host, config.port);
    if !config.validates_sessions() {
        tracing::warn!("AUTH_SECRET is not set; bearer tokens are taken as user IDs");
    }

    let pool = db::create_pool(&config).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        conn_manager: ConnectionManager::new_shared(),
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use tower::ServiceExt;

    fn test_app(auth_secret: Option<&str>) -> Router {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "postgres://binder@localhost/binder_test".into(),
            max_connections: 1,
            auth_secret: auth_secret.map(str::to_string),
        };
        // Never connects unless a handler reaches the database.
        let pool = db::create_lazy_pool(&config).unwrap();
        app(AppState {
            pool,
            config: Arc::new(config),
            conn_manager: ConnectionManager::new_shared(),
        })
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app(None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn test_collection_requires_credentials() {
        let response = test_app(None)
            .oneshot(Request::get("/collection").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "not_authenticated");
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_invalid_session() {
        let request = Request::put("/collection")
            .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"rows":[]}"#))
            .unwrap();
        let response = test_app(Some("secret")).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_session");
    }

    #[tokio::test]
    async fn test_ws_requires_credentials() {
        let response = test_app(None)
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
