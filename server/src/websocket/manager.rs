//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections per user so a write can notify every
//! open tab and device of that user, and nobody else.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Authenticated owner of the connection
    pub user_id: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Index of connection IDs by user.
    by_user_id: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_user_id: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, user_id: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        let connection = Connection {
            id: conn_id.clone(),
            user_id: user_id.clone(),
            sender,
        };

        self.connections.insert(conn_id.clone(), connection);
        self.by_user_id
            .entry(user_id)
            .or_default()
            .push(conn_id.clone());

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    /// Unregister a connection.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(mut conn_ids) = self.by_user_id.get_mut(&conn.user_id) {
                conn_ids.retain(|id| id != conn_id);
                if conn_ids.is_empty() {
                    drop(conn_ids);
                    self.by_user_id.remove(&conn.user_id);
                }
            }

            tracing::info!(conn_id = %conn.id, user_id = %conn.user_id, "WebSocket connection unregistered");
        }
    }

    /// Send a message to every connection of one user.
    ///
    /// Returns the number of connections that received the message.
    pub fn notify_user(&self, user_id: &str, message: ServerMessage) -> usize {
        let conn_ids = match self.by_user_id.get(user_id) {
            Some(ids) => ids.value().clone(),
            None => return 0,
        };

        let mut sent_count = 0;
        for conn_id in &conn_ids {
            if let Some(conn) = self.connections.get(conn_id) {
                if conn.sender.send(message.clone()).is_ok() {
                    sent_count += 1;
                }
            }
        }

        tracing::debug!(
            user_id = %user_id,
            recipients = sent_count,
            "Notified user connections"
        );

        sent_count
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of users with at least one connection.
    pub fn user_count(&self) -> usize {
        self.by_user_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let conn_id = manager.register("user-1".to_string(), tx);
        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.user_count(), 1);

        manager.unregister(&conn_id);
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.user_count(), 0);
    }

    #[test]
    fn test_notify_reaches_only_that_user() {
        let manager = ConnectionManager::new();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        manager.register("user-1".to_string(), tx1);
        manager.register("user-1".to_string(), tx2);
        manager.register("user-2".to_string(), tx3);

        let sent = manager.notify_user("user-1", ServerMessage::Pong);
        assert_eq!(sent, 2);

        assert!(matches!(rx1.try_recv().unwrap(), ServerMessage::Pong));
        assert!(matches!(rx2.try_recv().unwrap(), ServerMessage::Pong));
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn test_notify_unknown_user() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.notify_user("nobody", ServerMessage::Pong), 0);
    }

    #[test]
    fn test_closed_connection_is_not_counted() {
        let manager = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        manager.register("user-1".to_string(), tx);

        drop(rx);
        assert_eq!(manager.notify_user("user-1", ServerMessage::Pong), 0);
    }
}
