//! In-process storage.
//!
//! Clones share the same entries and event stream, so several engines built
//! on clones of one [`MemoryStorage`] behave like tabs of one browser profile.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{KeyValueStore, StorageEvent, EVENT_CAPACITY};
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Entries {
    values: HashMap<String, String>,
    /// Byte limit over all keys and values
    quota: Option<usize>,
}

impl Entries {
    fn used_bytes(&self) -> usize {
        self.values.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// Shared in-memory key-value store.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<Entries>>,
    events: broadcast::Sender<StorageEvent>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an empty store without a quota.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            events,
        }
    }

    /// Create an empty store limited to `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        let storage = Self::new();
        storage.set_quota(Some(quota));
        storage
    }

    /// Change the byte limit. Existing entries are kept.
    pub fn set_quota(&self, quota: Option<usize>) {
        self.entries.lock().quota = quota;
    }

    /// Read a value without going through the async port.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().values.get(key).cloned()
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn emit(&self, key: &str, new_value: Option<String>) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
        });
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.lock();
            if let Some(quota) = entries.quota {
                let previous = entries
                    .values
                    .get(key)
                    .map_or(0, |old| key.len() + old.len());
                let needed = entries.used_bytes() - previous + key.len() + value.len();
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }
            entries.values.insert(key.to_string(), value.clone());
        }
        self.emit(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let existed = self.entries.lock().values.remove(key).is_some();
        if existed {
            self.emit(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set("a", "1".to_string()).await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), Some("1".to_string()));

        storage.remove("a").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), None);
        storage.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_entries_and_events() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.clone();
        let mut events = tab_b.subscribe();

        tab_a.set("sync:x", "hello".to_string()).await.unwrap();

        assert_eq!(tab_b.peek("sync:x"), Some("hello".to_string()));
        let event = events.recv().await.unwrap();
        assert_eq!(event.key, "sync:x");
        assert_eq!(event.new_value.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes() {
        let storage = MemoryStorage::with_quota(10);
        storage.set("k", "12345".to_string()).await.unwrap();

        let err = storage.set("k2", "123456789".to_string()).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 10, .. }));
        assert_eq!(storage.peek("k2"), None);

        // Overwriting reuses the old entry's bytes.
        storage.set("k", "123456789".to_string()).await.unwrap();

        storage.set_quota(None);
        storage.set("k2", "123456789".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn remove_absent_emits_nothing() {
        let storage = MemoryStorage::new();
        let mut events = storage.subscribe();
        storage.remove("missing").await.unwrap();
        assert!(events.try_recv().is_err());
    }
}
