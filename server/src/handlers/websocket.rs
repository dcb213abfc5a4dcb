//! WebSocket handler for change notifications.
//!
//! A connection only listens: writes go through `PUT /collection`, and
//! every write fans out `collection_changed` to the user's connections.
//! The one request a client may send is `ping`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::websocket::{ClientMessage, ConnectionManager, ServerMessage};

/// Serve one connection until either side closes it.
pub async fn handle_websocket_connection(
    socket: WebSocket,
    conn_manager: Arc<ConnectionManager>,
    user_id: String,
) {
    let (tx, mut notifications) = mpsc::unbounded_channel::<ServerMessage>();
    let conn_id = conn_manager.register(user_id.clone(), tx);
    let (mut sink, mut stream) = socket.split();

    loop {
        let outgoing = tokio::select! {
            notification = notifications.recv() => match notification {
                Some(message) => message,
                None => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => reply_to(&text),
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(conn_id = %conn_id, "Client closed the connection");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket receive failed");
                    break;
                }
            },
        };

        let text = match serde_json::to_string(&outgoing) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize WebSocket message");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }

    conn_manager.unregister(&conn_id);
    tracing::debug!(
        active_connections = conn_manager.connection_count(),
        "WebSocket session ended"
    );
}

/// Answer a text frame from the client.
fn reply_to(text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Err(e) => ServerMessage::error(format!("Invalid message format: {}", e)),
    }
}
