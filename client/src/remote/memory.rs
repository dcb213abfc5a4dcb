//! In-process remote store.
//!
//! Holds per-user tables in memory, fans change notifications out to every
//! subscription of the written user, and can be switched unreachable to
//! simulate losing the network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use binder_engine::{Collection, Timestamp, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{ChangeStream, RemoteChange, RemoteStore};
use crate::auth::Session;
use crate::error::RemoteError;

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<HashMap<UserId, Collection>>,
    subscribers: Mutex<HashMap<UserId, Vec<mpsc::UnboundedSender<RemoteChange>>>>,
    revoked_tokens: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    writes: AtomicUsize,
    fetches: AtomicUsize,
    version: AtomicUsize,
}

/// Shared in-memory remote store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle network reachability.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Reject any request made with `token`.
    pub fn revoke(&self, token: &str) {
        self.inner.revoked_tokens.lock().insert(token.to_string());
    }

    /// Current stored snapshot for a user.
    pub fn snapshot(&self, user_id: &str) -> Collection {
        self.inner
            .tables
            .lock()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Write a user's rows directly, as another device would.
    pub fn put(&self, user_id: &str, collection: Collection) {
        self.store(user_id, collection);
    }

    /// Number of successful replace calls.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of successful fetch calls.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Open subscriptions for a user.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        match subscribers.get_mut(user_id) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    fn check(&self, session: &Session) -> Result<(), RemoteError> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("network is down".to_string()));
        }
        if self
            .inner
            .revoked_tokens
            .lock()
            .contains(&session.access_token)
        {
            return Err(RemoteError::InvalidSession);
        }
        Ok(())
    }

    fn store(&self, user_id: &str, collection: Collection) {
        let card_count = collection.len();
        self.inner
            .tables
            .lock()
            .insert(user_id.to_string(), collection);
        let updated_at = self.inner.version.fetch_add(1, Ordering::SeqCst) as Timestamp + 1;

        let change = RemoteChange {
            card_count,
            updated_at,
        };
        if let Some(senders) = self.inner.subscribers.lock().get_mut(user_id) {
            senders.retain(|tx| tx.send(change).is_ok());
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch(&self, session: &Session) -> Result<Collection, RemoteError> {
        self.check(session)?;
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot(&session.user_id))
    }

    async fn replace(
        &self,
        session: &Session,
        collection: &Collection,
    ) -> Result<(), RemoteError> {
        self.check(session)?;
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.store(&session.user_id, collection.clone());
        Ok(())
    }

    async fn subscribe(&self, session: &Session) -> Result<ChangeStream, RemoteError> {
        self.check(session)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .entry(session.user_id.clone())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
