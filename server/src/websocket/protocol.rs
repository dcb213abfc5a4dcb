//! WebSocket message protocol definitions.
//!
//! The message types live in `binder_engine::wire` so the client decodes
//! exactly what the server encodes. All messages are JSON with a
//! snake_case `type` tag.

pub use binder_engine::wire::{ClientMessage, ServerMessage};

/// Build the notification sent after a user's rows were rewritten.
pub fn collection_changed(card_count: usize, updated_at: binder_engine::Timestamp) -> ServerMessage {
    ServerMessage::CollectionChanged {
        card_count,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ping_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn test_collection_changed_format() {
        let json = serde_json::to_string(&collection_changed(2, 1_700_000_000_000)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"collection_changed","card_count":2,"updated_at":1700000000000}"#
        );
    }

    #[test]
    fn test_error_format() {
        let json = serde_json::to_string(&ServerMessage::error("bad")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"bad"}"#);
    }
}
