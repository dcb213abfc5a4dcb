//! Wire types shared by the sync client and the remote store server.
//!
//! The remote store keeps one row per `(user, card)`. HTTP bodies use
//! camelCase; the WebSocket protocol uses snake_case tags like the rest of
//! the push channel.

use crate::{CardId, CardQuantity, Collection, Timestamp};
use serde::{Deserialize, Serialize};

/// One stored row of a user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRow {
    pub card_id: CardId,
    pub normal_count: u32,
    pub foil_count: u32,
}

impl CollectionRow {
    pub fn quantity(&self) -> CardQuantity {
        CardQuantity::new(self.normal_count, self.foil_count)
    }
}

/// Convert a collection to rows. Empty quantities never produce a row.
pub fn collection_to_rows(collection: &Collection) -> Vec<CollectionRow> {
    collection
        .iter()
        .filter(|(_, qty)| !qty.is_empty())
        .map(|(card_id, qty)| CollectionRow {
            card_id: card_id.clone(),
            normal_count: qty.normal,
            foil_count: qty.foil,
        })
        .collect()
}

/// Build a collection from rows. Rows with both counts at zero are dropped.
pub fn rows_to_collection(rows: impl IntoIterator<Item = CollectionRow>) -> Collection {
    rows.into_iter()
        .map(|row| {
            let qty = row.quantity();
            (row.card_id, qty)
        })
        .collect()
}

/// Response for `GET /collection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub rows: Vec<CollectionRow>,
}

/// Request body for `PUT /collection`: the full replacement snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRequest {
    pub rows: Vec<CollectionRow>,
}

/// Response for `PUT /collection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceResponse {
    /// Rows now stored for the user
    pub card_count: usize,
    /// Server time of the write (milliseconds since epoch)
    pub updated_at: Timestamp,
}

/// Messages sent from client to server on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The user's stored collection was rewritten.
    ///
    /// Clients treat this as "invalidate and reconcile", never as a delta.
    CollectionChanged {
        card_count: usize,
        updated_at: Timestamp,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error { message: String },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
