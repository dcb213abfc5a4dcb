//! Typed access to the persisted keys of one tab.
//!
//! Keys are namespaced by a prefix: `{prefix}-collection`,
//! `{prefix}-last-sync` and `{prefix}-pending-changes`. Message keys
//! (`sync:<type>`) are shared by every namespace.
//!
//! Reads are async and tolerate corruption: a value that fails to parse is
//! logged and treated as absent. Writes are fire-and-forget and go through
//! one writer task per store, so they reach storage in the order they were
//! issued and a later snapshot is never overwritten by an earlier one.

use std::sync::Arc;

use binder_engine::{ChangeQueue, Collection, MessageKind, SyncMessage, Timestamp};
use tokio::sync::{mpsc, oneshot};

use crate::storage::KeyValueStore;

/// Names of the namespaced keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub collection: String,
    pub last_sync: String,
    pub pending_changes: String,
}

impl StorageKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            collection: format!("{prefix}-collection"),
            last_sync: format!("{prefix}-last-sync"),
            pending_changes: format!("{prefix}-pending-changes"),
        }
    }
}

#[derive(Debug)]
enum WriteOp {
    Set { key: String, value: String },
    Remove { key: String },
    Barrier(oneshot::Sender<()>),
}

/// The persistent local store of one tab.
#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn KeyValueStore>,
    keys: Arc<StorageKeys>,
    writer: mpsc::UnboundedSender<WriteOp>,
}

impl LocalStore {
    /// Wrap a storage port and start its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(storage: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(storage.clone(), rx));
        Self {
            storage,
            keys: Arc::new(StorageKeys::new(prefix)),
            writer,
        }
    }

    /// The underlying storage port.
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Read a key and parse it, treating failures as absent.
    async fn read<T, E: std::fmt::Display>(
        &self,
        key: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Option<T> {
        let raw = match self.storage.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to read local storage");
                return None;
            }
        };
        match parse(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Malformed persisted value, treating as absent");
                None
            }
        }
    }

    /// The persisted collection, if any.
    pub async fn load_collection(&self) -> Option<Collection> {
        self.read(&self.keys.collection, |raw| {
            serde_json::from_str::<Collection>(raw)
        })
        .await
    }

    /// When this user last completed a remote sync, if ever.
    pub async fn load_last_sync(&self) -> Option<Timestamp> {
        self.read(&self.keys.last_sync, |raw| raw.trim().parse::<Timestamp>())
            .await
    }

    /// The pending change log; empty when absent or malformed.
    pub async fn load_queue(&self) -> ChangeQueue {
        self.read(&self.keys.pending_changes, ChangeQueue::from_json)
            .await
            .unwrap_or_default()
    }

    /// The most recent message written on a channel.
    pub async fn load_message(&self, kind: MessageKind) -> Option<SyncMessage> {
        self.read(&kind.storage_key(), SyncMessage::from_json).await
    }

    pub fn save_collection(&self, collection: &Collection) {
        match serde_json::to_string(collection) {
            Ok(value) => self.set(self.keys.collection.clone(), value),
            Err(e) => tracing::error!(error = %e, "Failed to serialize collection"),
        }
    }

    pub fn save_last_sync(&self, timestamp: Timestamp) {
        self.set(self.keys.last_sync.clone(), timestamp.to_string());
    }

    /// Persist the pending log. An empty log removes the key.
    pub fn save_queue(&self, queue: &ChangeQueue) {
        if queue.is_empty() {
            self.remove(self.keys.pending_changes.clone());
            return;
        }
        match queue.to_json() {
            Ok(value) => self.set(self.keys.pending_changes.clone(), value),
            Err(e) => tracing::error!(error = %e, "Failed to serialize pending changes"),
        }
    }

    /// Write a message to its channel key.
    pub fn write_message(&self, message: &SyncMessage) {
        match message.to_json() {
            Ok(value) => self.set(message.storage_key(), value),
            Err(e) => tracing::error!(error = %e, "Failed to serialize sync message"),
        }
    }

    /// Remove every key of this namespace and the last collection message.
    pub fn clear(&self) {
        self.remove(self.keys.collection.clone());
        self.remove(self.keys.last_sync.clone());
        self.remove(self.keys.pending_changes.clone());
        self.remove(MessageKind::CollectionUpdated.storage_key());
    }

    /// Wait until every write issued so far has reached storage.
    pub async fn flushed(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriteOp::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn set(&self, key: String, value: String) {
        if self.writer.send(WriteOp::Set { key, value }).is_err() {
            tracing::error!("Local store writer stopped; write dropped");
        }
    }

    fn remove(&self, key: String) {
        if self.writer.send(WriteOp::Remove { key }).is_err() {
            tracing::error!("Local store writer stopped; removal dropped");
        }
    }
}

/// Apply writes one at a time, in order.
///
/// Failures (quota exceeded, IO) are logged and never retried: the
/// in-memory state stays correct and the next write carries a full snapshot.
async fn run_writer(storage: Arc<dyn KeyValueStore>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Set { key, value } => {
                if let Err(e) = storage.set(&key, value).await {
                    tracing::error!(key = %key, error = %e, "Failed to persist; durability degraded");
                }
            }
            WriteOp::Remove { key } => {
                if let Err(e) = storage.remove(&key).await {
                    tracing::error!(key = %key, error = %e, "Failed to remove persisted key");
                }
            }
            WriteOp::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use binder_engine::{PendingChange, SyncPayload};

    fn store(storage: &MemoryStorage) -> LocalStore {
        LocalStore::new(Arc::new(storage.clone()), "binder")
    }

    #[test]
    fn key_names() {
        let keys = StorageKeys::new("wakfu");
        assert_eq!(keys.collection, "wakfu-collection");
        assert_eq!(keys.last_sync, "wakfu-last-sync");
        assert_eq!(keys.pending_changes, "wakfu-pending-changes");
    }

    #[tokio::test]
    async fn collection_round_trip() {
        let storage = MemoryStorage::new();
        let local = store(&storage);
        assert_eq!(local.load_collection().await, None);

        let mut collection = Collection::new();
        collection.add("card-1", 2, false);
        local.save_collection(&collection);
        local.flushed().await;

        assert_eq!(local.load_collection().await, Some(collection));
    }

    #[tokio::test]
    async fn writes_apply_in_order() {
        let storage = MemoryStorage::new();
        let local = store(&storage);

        for n in 1..=50 {
            let mut collection = Collection::new();
            collection.add("card", n, false);
            local.save_collection(&collection);
        }
        local.flushed().await;

        let loaded = local.load_collection().await.unwrap();
        assert_eq!(loaded.quantity_of("card"), 50);
    }

    #[tokio::test]
    async fn malformed_values_read_as_absent() {
        let storage = MemoryStorage::new();
        storage.set("binder-collection", "{not json".to_string()).await.unwrap();
        storage.set("binder-last-sync", "yesterday".to_string()).await.unwrap();
        storage
            .set("binder-pending-changes", "[1,2]".to_string())
            .await
            .unwrap();

        let local = store(&storage);
        assert_eq!(local.load_collection().await, None);
        assert_eq!(local.load_last_sync().await, None);
        assert!(local.load_queue().await.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_removes_key() {
        let storage = MemoryStorage::new();
        let local = store(&storage);

        let mut queue = ChangeQueue::new();
        queue.enqueue(PendingChange::collection_update(Collection::new(), 1));
        local.save_queue(&queue);
        local.flushed().await;
        assert!(storage.peek("binder-pending-changes").is_some());

        local.save_queue(&ChangeQueue::new());
        local.flushed().await;
        assert!(storage.peek("binder-pending-changes").is_none());
    }

    #[tokio::test]
    async fn quota_failure_is_swallowed() {
        let storage = MemoryStorage::with_quota(8);
        let local = store(&storage);

        let mut collection = Collection::new();
        collection.add("a-card-with-a-long-id", 1, false);
        local.save_collection(&collection);
        local.flushed().await;

        assert_eq!(local.load_collection().await, None);
    }

    #[tokio::test]
    async fn clear_removes_namespace_and_collection_message() {
        let storage = MemoryStorage::new();
        let local = store(&storage);

        local.save_collection(&Collection::new());
        local.save_last_sync(5);
        local.write_message(&SyncMessage::new(
            SyncPayload::CollectionUpdated(Collection::new()),
            1,
            "tab",
        ));
        local.flushed().await;
        assert_eq!(storage.keys().len(), 3);

        local.clear();
        local.flushed().await;
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn message_round_trip() {
        let storage = MemoryStorage::new();
        let local = store(&storage);
        let message = SyncMessage::new(
            SyncPayload::CollectionUpdated(Collection::new()),
            42,
            "tab",
        );
        local.write_message(&message);
        local.flushed().await;

        assert_eq!(
            local.load_message(MessageKind::CollectionUpdated).await,
            Some(message)
        );
        assert_eq!(local.load_message(MessageKind::StateUpdated).await, None);
    }
}
