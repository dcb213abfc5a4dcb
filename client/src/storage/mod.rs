//! Persistent key-value storage shared by every tab of one user.
//!
//! This is pure storage, no logic. Each adapter fans out a [`StorageEvent`]
//! for every write so sibling tabs can observe changes to the message keys.
//! Events reach every subscriber, including the writer itself; receivers
//! filter their own messages by origin.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::StorageError;

/// Buffered events per subscriber before it starts lagging.
pub(crate) const EVENT_CAPACITY: usize = 256;

/// A change to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed
    pub key: String,
    /// New value, `None` when the key was removed
    pub new_value: Option<String>,
}

/// Async key-value port.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Receive every subsequent change.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}
