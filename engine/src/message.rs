//! Cross-tab sync messages.
//!
//! Tabs of the same user share one persistent store. A tab announces a
//! change by writing a [`SyncMessage`] to the well-known key of its channel;
//! sibling tabs observe the storage change and replay the payload.

use crate::{error::Result, Collection, Error, OriginId, Timestamp};
use serde::{Deserialize, Serialize};

/// Prefix shared by every message key in persistent storage.
pub const MESSAGE_KEY_PREFIX: &str = "sync:";

/// Channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// A full collection snapshot
    CollectionUpdated,
    /// Sync bookkeeping shared between tabs
    StateUpdated,
}

impl MessageKind {
    /// All channels, in a stable order.
    pub const ALL: [MessageKind; 2] = [MessageKind::CollectionUpdated, MessageKind::StateUpdated];

    /// The channel name used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::CollectionUpdated => "collection:updated",
            MessageKind::StateUpdated => "state:updated",
        }
    }

    /// The storage key holding the latest message of this kind.
    pub fn storage_key(&self) -> String {
        format!("{}{}", MESSAGE_KEY_PREFIX, self.as_str())
    }

    /// Resolve a storage key back to its channel.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let channel = key.strip_prefix(MESSAGE_KEY_PREFIX)?;
        Self::ALL.into_iter().find(|kind| kind.as_str() == channel)
    }
}

/// Non-collection state that sibling tabs mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum StateUpdate {
    /// A remote sync completed at this time
    LastSync(Timestamp),
    /// The user signed out; persisted state was cleared
    SignedOut,
}

/// Message payload, tagged by channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SyncPayload {
    /// Replace the collection with this snapshot
    CollectionUpdated(Collection),
    /// Apply a state update
    StateUpdated(StateUpdate),
}

impl SyncPayload {
    /// The channel this payload travels on.
    pub fn kind(&self) -> MessageKind {
        match self {
            SyncPayload::CollectionUpdated(_) => MessageKind::CollectionUpdated,
            SyncPayload::StateUpdated(_) => MessageKind::StateUpdated,
        }
    }
}

/// A message written to shared storage for sibling tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    /// Channel tag and payload
    #[serde(flatten)]
    pub payload: SyncPayload,
    /// Sender's wall-clock milliseconds
    pub timestamp: Timestamp,
    /// Unique ID of the sending tab
    pub origin_id: OriginId,
}

impl SyncMessage {
    /// Create a message.
    pub fn new(payload: SyncPayload, timestamp: Timestamp, origin_id: impl Into<OriginId>) -> Self {
        Self {
            payload,
            timestamp,
            origin_id: origin_id.into(),
        }
    }

    /// The channel this message travels on.
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// The storage key this message is written to.
    pub fn storage_key(&self) -> String {
        self.kind().storage_key()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidMessage(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidMessage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys() {
        assert_eq!(
            MessageKind::CollectionUpdated.storage_key(),
            "sync:collection:updated"
        );
        assert_eq!(MessageKind::StateUpdated.storage_key(), "sync:state:updated");
    }

    #[test]
    fn storage_key_lookup() {
        assert_eq!(
            MessageKind::from_storage_key("sync:state:updated"),
            Some(MessageKind::StateUpdated)
        );
        assert_eq!(MessageKind::from_storage_key("sync:other"), None);
        assert_eq!(MessageKind::from_storage_key("binder-collection"), None);
    }

    #[test]
    fn wire_shape() {
        let mut collection = Collection::new();
        collection.add("card-1", 2, false);
        let msg = SyncMessage::new(SyncPayload::CollectionUpdated(collection), 100, "tab-x");

        let json = msg.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "collectionUpdated");
        assert_eq!(value["payload"]["card-1"]["normal"], 2);
        assert_eq!(value["timestamp"], 100);
        assert_eq!(value["originId"], "tab-x");
    }

    #[test]
    fn state_update_shape() {
        let msg = SyncMessage::new(
            SyncPayload::StateUpdated(StateUpdate::LastSync(5)),
            6,
            "tab-y",
        );
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "stateUpdated");
        assert_eq!(value["payload"]["state"], "lastSync");
        assert_eq!(value["payload"]["value"], 5);

        let parsed = SyncMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.kind(), MessageKind::StateUpdated);
    }

    #[test]
    fn signed_out_has_no_value() {
        let payload = SyncPayload::StateUpdated(StateUpdate::SignedOut);
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"type":"stateUpdated","payload":{"state":"signedOut"}}"#);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            SyncMessage::from_json("{}"),
            Err(Error::InvalidMessage(_))
        ));
        assert!(SyncMessage::from_json(r#"{"type":"unknown","payload":1,"timestamp":1,"originId":"x"}"#).is_err());
    }
}
