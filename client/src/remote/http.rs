//! HTTP + WebSocket client for `binder-server`.
//!
//! `GET /collection` and `PUT /collection` carry the rows; `/ws` pushes
//! `collection_changed` notifications for the authenticated user.

use std::time::Duration;

use async_trait::async_trait;
use binder_engine::wire::{
    collection_to_rows, rows_to_collection, ClientMessage, CollectionResponse, ReplaceRequest,
    ReplaceResponse, ServerMessage,
};
use binder_engine::Collection;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{ChangeStream, RemoteChange, RemoteStore};
use crate::auth::Session;
use crate::error::RemoteError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PING_INTERVAL: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Remote store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Create a client for a server at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collection", self.base_url)
    }

    fn ws_url(&self) -> String {
        if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}/ws")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}/ws")
        } else {
            format!("{}/ws", self.base_url)
        }
    }
}

/// Turn non-success statuses into errors.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(RemoteError::InvalidSession);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

fn map_ws_error(err: WsError) -> RemoteError {
    match err {
        WsError::Http(response) if response.status() == StatusCode::UNAUTHORIZED => {
            RemoteError::InvalidSession
        }
        other => RemoteError::Unreachable(other.to_string()),
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch(&self, session: &Session) -> Result<Collection, RemoteError> {
        let response = self
            .client
            .get(self.collection_url())
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let body: CollectionResponse = check(response).await?.json().await?;

        tracing::debug!(rows = body.rows.len(), "Fetched remote collection");
        Ok(rows_to_collection(body.rows))
    }

    async fn replace(
        &self,
        session: &Session,
        collection: &Collection,
    ) -> Result<(), RemoteError> {
        let request = ReplaceRequest {
            rows: collection_to_rows(collection),
        };
        let response = self
            .client
            .put(self.collection_url())
            .bearer_auth(&session.access_token)
            .json(&request)
            .send()
            .await?;
        let body: ReplaceResponse = check(response).await?.json().await?;

        tracing::debug!(
            card_count = body.card_count,
            updated_at = body.updated_at,
            "Replaced remote collection"
        );
        Ok(())
    }

    async fn subscribe(&self, session: &Session) -> Result<ChangeStream, RemoteError> {
        let mut request = self
            .ws_url()
            .into_client_request()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", session.access_token))
            .map_err(|_| RemoteError::InvalidSession)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, _) = connect_async(request).await.map_err(map_ws_error)?;
        tracing::debug!(user_id = %session.user_id, "Change subscription opened");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_changes(ws, tx));
        Ok(rx)
    }
}

/// Pump server notifications into the change stream until either side goes
/// away.
async fn forward_changes(ws: WsStream, tx: mpsc::UnboundedSender<RemoteChange>) {
    let (mut write, mut read) = ws.split();

    let ping = match serde_json::to_string(&ClientMessage::Ping) {
        Ok(ping) => ping,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize ping");
            return;
        }
    };

    let mut keepalive = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            _ = keepalive.tick() => {
                if write.send(Message::Text(ping.clone())).await.is_err() {
                    break;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::CollectionChanged { card_count, updated_at }) => {
                        let change = RemoteChange { card_count, updated_at };
                        if tx.send(change).is_err() {
                            break;
                        }
                    }
                    Ok(ServerMessage::Pong) => {}
                    Ok(ServerMessage::Error { message }) => {
                        tracing::warn!(message = %message, "Server reported an error");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed server message");
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Change subscription failed");
                    break;
                }
            }
        }
    }

    tracing::debug!("Change subscription closed");
}
