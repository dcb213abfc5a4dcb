//! The collection engine: one instance per tab.
//!
//! Wires collection state, the local store, the remote sync client, the
//! scheduler and the cross-tab broadcaster together behind a small API.
//! Mutations are synchronous and never fail; persistence, sibling
//! notification and remote writes follow in the background.

use std::sync::Arc;

use binder_engine::{
    Collection, CollectionExport, CollectionStats, StateUpdate, SyncPayload, SyncResult, Timestamp,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::AuthHandle;
use crate::broadcast::CrossTabBroadcaster;
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::local::LocalStore;
use crate::remote::RemoteStore;
use crate::scheduler::SyncScheduler;
use crate::state::CollectionState;
use crate::storage::KeyValueStore;
use crate::sync_client::{RemoteSyncClient, Restored};

/// Injected dependencies of an engine.
#[derive(Clone)]
pub struct EngineDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthHandle,
}

impl EngineDeps {
    /// Dependencies using the system clock.
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        auth: AuthHandle,
    ) -> Self {
        Self {
            storage,
            remote,
            clock: Arc::new(SystemClock),
            auth,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

pub struct CollectionEngine {
    state: CollectionState,
    local: LocalStore,
    client: Arc<RemoteSyncClient>,
    broadcaster: Arc<CrossTabBroadcaster>,
    scheduler: SyncScheduler,
    listener: JoinHandle<()>,
    auth: AuthHandle,
    clock: Arc<dyn Clock>,
}

impl CollectionEngine {
    /// Restore persisted state and start the background tasks.
    pub async fn start(deps: EngineDeps, config: SyncConfig) -> Self {
        let local = LocalStore::new(deps.storage.clone(), &config.key_prefix);

        // Subscribe before reading so no sibling write falls in between.
        let events = deps.storage.subscribe();
        let broadcaster = Arc::new(CrossTabBroadcaster::new(local.clone(), deps.clock.clone()));
        broadcaster.prime().await;

        let collection = local.load_collection().await.unwrap_or_default();
        let restored = Restored {
            queue: local.load_queue().await,
            last_sync: local.load_last_sync().await,
        };
        tracing::info!(
            origin_id = %broadcaster.origin_id(),
            cards = collection.len(),
            pending = restored.queue.len(),
            "Collection engine starting"
        );

        let state = CollectionState::new(collection);
        let client = Arc::new(RemoteSyncClient::new(
            state.clone(),
            local.clone(),
            deps.remote,
            deps.auth.clone(),
            deps.clock.clone(),
            broadcaster.clone(),
            restored,
        ));
        let listener = broadcaster
            .clone()
            .listen(events, state.clone(), client.clone());
        let scheduler = SyncScheduler::start(client.clone(), deps.auth.subscribe(), &config);

        Self {
            state,
            local,
            client,
            broadcaster,
            scheduler,
            listener,
            auth: deps.auth,
            clock: deps.clock,
        }
    }

    /// Add copies of a card. A zero count is a no-op.
    pub fn add(&self, card_id: &str, count: u32, foil: bool) {
        if self.state.add(card_id, count, foil) {
            self.local_change();
        }
    }

    /// Remove copies of a card, clamping at zero.
    pub fn remove(&self, card_id: &str, count: u32, foil: bool) {
        if self.state.remove(card_id, count, foil) {
            self.local_change();
        }
    }

    pub fn quantity_of(&self, card_id: &str) -> u32 {
        self.state.quantity_of(card_id)
    }

    pub fn foil_quantity_of(&self, card_id: &str) -> u32 {
        self.state.foil_quantity_of(card_id)
    }

    pub fn snapshot(&self) -> Collection {
        self.state.snapshot()
    }

    pub fn stats(&self) -> CollectionStats {
        self.state.stats()
    }

    /// Observe the collection.
    pub fn subscribe(&self) -> watch::Receiver<Collection> {
        self.state.subscribe()
    }

    /// Sync now, cancelling any pending debounced save.
    pub async fn sync_now(&self) -> SyncResult {
        match self.scheduler.sync_now().await {
            Some(result) => result,
            None => self.client.sync().await,
        }
    }

    /// Write queued changes now.
    pub async fn flush(&self) -> SyncResult {
        match self.scheduler.flush().await {
            Some(result) => result,
            None => self.client.flush().await,
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.client.is_syncing()
    }

    pub fn last_sync_timestamp(&self) -> Option<Timestamp> {
        self.client.last_sync()
    }

    pub fn is_online(&self) -> bool {
        self.client.is_online()
    }

    /// Report a connectivity change. Going online flushes the queue.
    pub fn set_online(&self, online: bool) {
        if self.client.set_online(online) {
            self.scheduler.connectivity_changed(online);
        }
    }

    pub fn pending_changes(&self) -> usize {
        self.client.pending_changes()
    }

    pub fn is_subscribed(&self) -> bool {
        self.client.is_subscribed()
    }

    pub fn export_collection(&self) -> CollectionExport {
        CollectionExport::new(self.state.snapshot(), self.clock.now_ms())
    }

    /// Replace the collection with an exported one. Returns whether it
    /// changed.
    pub fn import_collection(&self, export: CollectionExport) -> bool {
        let changed = self.state.replace(export.collection);
        if changed {
            self.local_change();
        }
        changed
    }

    /// Sign out, clearing the collection and every persisted key, and tell
    /// sibling tabs to do the same.
    pub fn sign_out(&self) {
        self.scheduler.cancel_pending();
        self.auth.sign_out();
        self.client.forget();
        self.state.clear();
        self.local.clear();
        self.broadcaster
            .broadcast(SyncPayload::StateUpdated(StateUpdate::SignedOut));
    }

    /// This tab's origin ID.
    pub fn origin_id(&self) -> &str {
        self.broadcaster.origin_id()
    }

    /// Stop background work and wait for pending local writes.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        self.listener.abort();
        self.client.unsubscribe();
        self.local.flushed().await;
        tracing::info!(origin_id = %self.broadcaster.origin_id(), "Collection engine stopped");
    }

    /// Persist, tell sibling tabs, and schedule a remote write.
    fn local_change(&self) {
        self.client.note_local_change();
        let snapshot = self.state.snapshot();
        self.local.save_collection(&snapshot);
        self.broadcaster
            .broadcast(SyncPayload::CollectionUpdated(snapshot));
        self.scheduler.local_change();
    }
}

impl Drop for CollectionEngine {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
