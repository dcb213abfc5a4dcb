//! WebSocket support for change notifications.
//!
//! Clients keep one connection per tab open on `/ws`. After any write to a
//! user's rows, every connection of that user receives `collection_changed`
//! and reloads over HTTP.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
