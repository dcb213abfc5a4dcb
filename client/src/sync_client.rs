//! Remote sync client.
//!
//! Moves snapshots between the in-memory [`CollectionState`] and the remote
//! store. Every attempt is serialized by one async lock, so a debounce save,
//! a periodic sync and a push-triggered load never interleave.
//!
//! Failures never escape as errors. They come back as a [`SyncResult`], and
//! a snapshot that could not be written lands in the [`ChangeQueue`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use binder_engine::{
    ChangeQueue, Collection, PendingChange, StateUpdate, SyncPayload, SyncReason, SyncResult,
    Timestamp, UserId,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthHandle, Session};
use crate::broadcast::CrossTabBroadcaster;
use crate::clock::Clock;
use crate::error::RemoteError;
use crate::local::LocalStore;
use crate::remote::RemoteStore;
use crate::state::CollectionState;

/// A live change subscription.
struct Subscription {
    user_id: UserId,
    task: JoinHandle<()>,
}

/// Persisted sync state restored at startup.
#[derive(Debug, Default)]
pub struct Restored {
    pub queue: ChangeQueue,
    pub last_sync: Option<Timestamp>,
}

pub struct RemoteSyncClient {
    state: CollectionState,
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
    auth: AuthHandle,
    clock: Arc<dyn Clock>,
    broadcaster: Arc<CrossTabBroadcaster>,
    queue: Mutex<ChangeQueue>,
    last_sync: watch::Sender<Option<Timestamp>>,
    online: watch::Sender<bool>,
    syncing: AtomicBool,
    /// Bumped by every local mutation.
    generation: AtomicU64,
    /// Highest generation known to be written remotely.
    saved_generation: AtomicU64,
    attempt: tokio::sync::Mutex<()>,
    subscription: Mutex<Option<Subscription>>,
}

/// Clears the syncing flag when an attempt ends.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RemoteSyncClient {
    pub fn new(
        state: CollectionState,
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        auth: AuthHandle,
        clock: Arc<dyn Clock>,
        broadcaster: Arc<CrossTabBroadcaster>,
        restored: Restored,
    ) -> Self {
        let (last_sync, _) = watch::channel(restored.last_sync);
        let (online, _) = watch::channel(true);
        Self {
            state,
            local,
            remote,
            auth,
            clock,
            broadcaster,
            queue: Mutex::new(restored.queue),
            last_sync,
            online,
            syncing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            saved_generation: AtomicU64::new(0),
            attempt: tokio::sync::Mutex::new(()),
            subscription: Mutex::new(None),
        }
    }

    /// Per-card, per-variant maximum of two snapshots.
    pub fn merge(local: &Collection, remote: &Collection) -> Collection {
        binder_engine::merge(local, remote)
    }

    /// Fetch the remote snapshot and merge it into local state.
    ///
    /// Local state that is ahead of the remote (including a first sync
    /// after offline-only use) is pushed back, so an empty remote account
    /// never erases local cards.
    pub async fn load(&self) -> SyncResult {
        let _attempt = self.attempt.lock().await;
        let _syncing = self.begin();
        self.load_locked().await
    }

    /// Replace the remote snapshot with the current local one.
    ///
    /// The snapshot is read when the attempt starts, never earlier. On
    /// failure it is queued for [`flush`](Self::flush).
    pub async fn save(&self) -> SyncResult {
        let _attempt = self.attempt.lock().await;
        let _syncing = self.begin();
        self.save_locked().await
    }

    /// Write pending work, stopping at the first failure. Each queued entry
    /// is acknowledged only after the current local snapshot was written.
    pub async fn flush(&self) -> SyncResult {
        let _attempt = self.attempt.lock().await;
        let _syncing = self.begin();
        self.flush_locked().await
    }

    /// One full sync: flush pending work, else save unsaved edits, else
    /// pull remote changes.
    pub async fn sync(&self) -> SyncResult {
        let _attempt = self.attempt.lock().await;
        let _syncing = self.begin();

        if !self.queue.lock().is_empty() {
            return self.flush_locked().await;
        }
        if self.has_unsaved_changes() {
            return self.save_locked().await;
        }
        self.load_locked().await
    }

    /// Open the push subscription for the signed-in user, unless one is
    /// already running for them. Every notification triggers a load.
    pub async fn subscribe(self: &Arc<Self>) -> SyncResult {
        let Some(session) = self.auth.session() else {
            return SyncResult::not_authenticated();
        };
        if self.is_subscribed_as(&session.user_id) {
            return SyncResult::ok(self.state.snapshot().len());
        }
        if !self.is_online() {
            return SyncResult::failed(SyncReason::Offline, None);
        }

        let mut changes = match self.remote.subscribe(&session).await {
            Ok(changes) => changes,
            Err(e) => return self.report("subscribe", &e, SyncReason::LoadFailed),
        };

        let client: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let Some(client) = client.upgrade() else {
                    break;
                };
                tracing::debug!(
                    card_count = change.card_count,
                    updated_at = change.updated_at,
                    "Remote collection changed"
                );
                client.load().await;
            }
        });

        tracing::info!(user_id = %session.user_id, "Subscribed to remote changes");
        let previous = self.subscription.lock().replace(Subscription {
            user_id: session.user_id,
            task,
        });
        if let Some(previous) = previous {
            previous.task.abort();
        }
        SyncResult::ok(self.state.snapshot().len())
    }

    /// Close the push subscription, if any.
    pub fn unsubscribe(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.task.abort();
            tracing::debug!(user_id = %subscription.user_id, "Unsubscribed from remote changes");
        }
    }

    /// Whether a push subscription is running.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    fn is_subscribed_as(&self, user_id: &str) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(|s| s.user_id == user_id && !s.task.is_finished())
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// When a remote sync last completed, in this tab or a sibling.
    pub fn last_sync(&self) -> Option<Timestamp> {
        *self.last_sync.borrow()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Flip the connectivity flag. Returns whether it changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        })
    }

    /// Snapshots waiting to be written.
    pub fn pending_changes(&self) -> usize {
        self.queue.lock().len()
    }

    /// Record that local state changed since the last write.
    pub fn note_local_change(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn has_unsaved_changes(&self) -> bool {
        self.generation.load(Ordering::SeqCst) > self.saved_generation.load(Ordering::SeqCst)
    }

    /// Mirror a sibling tab's sync time. Never moves backwards.
    pub fn observe_last_sync(&self, timestamp: Timestamp) {
        self.last_sync.send_if_modified(|last| {
            if last.is_some_and(|last| last >= timestamp) {
                return false;
            }
            *last = Some(timestamp);
            true
        });
    }

    /// Drop in-memory sync state after a sign-out. Persisted keys are the
    /// caller's concern.
    pub fn forget(&self) {
        self.unsubscribe();
        self.queue.lock().clear();
        self.last_sync.send_replace(None);
        let generation = self.generation.load(Ordering::SeqCst);
        self.saved_generation.store(generation, Ordering::SeqCst);
    }

    fn begin(&self) -> SyncingGuard<'_> {
        self.syncing.store(true, Ordering::SeqCst);
        SyncingGuard(&self.syncing)
    }

    async fn load_locked(&self) -> SyncResult {
        let Some(session) = self.auth.session() else {
            tracing::debug!("Load skipped: not authenticated");
            return SyncResult::not_authenticated();
        };
        if !self.is_online() {
            tracing::debug!("Load skipped: offline");
            return SyncResult::failed(SyncReason::Offline, None);
        }

        let remote = match self.remote.fetch(&session).await {
            Ok(remote) => remote,
            Err(e) => return self.report("load", &e, SyncReason::LoadFailed),
        };

        let first_sync = self.last_sync().is_none();
        let generation = self.generation.load(Ordering::SeqCst);
        let result = self.state.merge_in(&remote);

        if first_sync && result.needs_push() {
            tracing::info!(
                local_only = result.raised_remotely.len(),
                "First sync with existing local cards; merging before push"
            );
        }
        if result.needs_pull() {
            tracing::info!(cards = result.raised_locally.len(), "Applied remote changes");
            self.publish_local(&result.merged);
        }
        if result.needs_push() {
            return self.push(&session, result.merged, generation).await;
        }

        self.mark_synced();
        SyncResult::ok(result.merged.len())
    }

    async fn save_locked(&self) -> SyncResult {
        // Read the generation first: a mutation landing in between is then
        // still treated as unsaved.
        let generation = self.generation.load(Ordering::SeqCst);
        let snapshot = self.state.snapshot();

        let Some(session) = self.auth.session() else {
            tracing::debug!("Save deferred: not authenticated");
            self.enqueue(snapshot);
            return SyncResult::not_authenticated();
        };
        if !self.is_online() {
            tracing::warn!("Save deferred: offline");
            self.enqueue(snapshot);
            return SyncResult::failed(SyncReason::SyncFailed, Some("offline".to_string()));
        }

        self.push(&session, snapshot, generation).await
    }

    async fn flush_locked(&self) -> SyncResult {
        let mut card_count = self.state.snapshot().len();

        loop {
            let Some(entry) = self.queue.lock().front().cloned() else {
                break;
            };
            let Some(session) = self.auth.session() else {
                tracing::debug!("Flush skipped: not authenticated");
                return SyncResult::not_authenticated();
            };
            if !self.is_online() {
                tracing::debug!("Flush skipped: offline");
                return SyncResult::failed(SyncReason::Offline, None);
            }

            // A queued snapshot is an earlier state of the local collection,
            // so the current one is written in its place. Never merged with
            // the remote: that would undo removals made while offline.
            let generation = self.generation.load(Ordering::SeqCst);
            let snapshot = self.state.snapshot();
            if let Err(e) = self.remote.replace(&session, &snapshot).await {
                return self.report("flush", &e, SyncReason::SyncFailed);
            }

            {
                let mut queue = self.queue.lock();
                queue.acknowledge(entry.enqueued_at);
                self.local.save_queue(&queue);
            }
            self.saved_generation.fetch_max(generation, Ordering::SeqCst);
            self.mark_synced();
            card_count = snapshot.len();

            tracing::info!(
                cards = card_count,
                enqueued_at = entry.enqueued_at,
                "Flushed pending change"
            );
        }

        SyncResult::ok(card_count)
    }

    async fn push(&self, session: &Session, collection: Collection, generation: u64) -> SyncResult {
        match self.remote.replace(session, &collection).await {
            Ok(()) => {
                self.saved_generation.fetch_max(generation, Ordering::SeqCst);
                self.mark_synced();
                tracing::debug!(cards = collection.len(), "Saved collection remotely");
                SyncResult::ok(collection.len())
            }
            Err(e) => {
                self.enqueue(collection);
                self.report("save", &e, SyncReason::SyncFailed)
            }
        }
    }

    /// Persist a merged collection and tell sibling tabs.
    fn publish_local(&self, collection: &Collection) {
        self.local.save_collection(collection);
        self.broadcaster
            .broadcast(SyncPayload::CollectionUpdated(collection.clone()));
    }

    fn enqueue(&self, collection: Collection) {
        let mut queue = self.queue.lock();
        // Keep stamps unique so acknowledging one entry never removes a
        // newer one.
        let floor = queue.iter().last().map_or(0, |c| c.enqueued_at + 1);
        let enqueued_at = self.clock.now_ms().max(floor);
        queue.enqueue(PendingChange::collection_update(collection, enqueued_at));
        self.local.save_queue(&queue);

        tracing::debug!(pending = queue.len(), "Queued snapshot for retry");
    }

    /// Record a completed sync, persist it and tell sibling tabs.
    fn mark_synced(&self) {
        let now = self.clock.now_ms();
        let mut advanced = None;
        self.last_sync.send_if_modified(|last| {
            let next = last.map_or(now, |last| last.max(now));
            if *last == Some(next) {
                return false;
            }
            *last = Some(next);
            advanced = Some(next);
            true
        });

        if let Some(timestamp) = advanced {
            self.local.save_last_sync(timestamp);
            self.broadcaster
                .broadcast(SyncPayload::StateUpdated(StateUpdate::LastSync(timestamp)));
        }
    }

    fn report(&self, operation: &'static str, err: &RemoteError, fallback: SyncReason) -> SyncResult {
        let reason = err.reason(fallback);
        if err.is_silent() {
            tracing::debug!(operation, reason = reason.as_str(), "Remote operation skipped");
        } else {
            tracing::warn!(operation, error = %err, "Remote operation failed; will retry");
        }
        SyncResult::failed(reason, Some(err.to_string()))
    }
}

impl Drop for RemoteSyncClient {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
