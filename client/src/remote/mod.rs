//! Remote store port.
//!
//! The remote store keeps one row per `(user, card)` and offers three
//! primitives: bulk query, bulk replace, and a change subscription filtered
//! by user. Notifications carry no data; clients reload and merge.

mod http;
mod memory;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

use async_trait::async_trait;
use binder_engine::{Collection, Timestamp};
use tokio::sync::mpsc;

use crate::auth::Session;
use crate::error::RemoteError;

/// Notification that the user's remote rows were rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteChange {
    /// Rows stored after the write
    pub card_count: usize,
    /// Remote time of the write
    pub updated_at: Timestamp,
}

/// Stream of change notifications. Dropping it ends the subscription.
pub type ChangeStream = mpsc::UnboundedReceiver<RemoteChange>;

/// Async remote store port.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch the user's full snapshot.
    async fn fetch(&self, session: &Session) -> Result<Collection, RemoteError>;

    /// Replace the user's snapshot (delete-then-insert).
    async fn replace(&self, session: &Session, collection: &Collection)
        -> Result<(), RemoteError>;

    /// Open a change subscription for the user.
    async fn subscribe(&self, session: &Session) -> Result<ChangeStream, RemoteError>;
}
