//! Cross-tab broadcaster.
//!
//! A tab announces a change by writing a [`SyncMessage`] to the well-known
//! storage key of its channel. Every tab listens to storage events and
//! replays admitted messages into its own state, never re-broadcasting them.
//!
//! A message is discarded when
//! - it carries this tab's own origin ID (self-echo), or
//! - its timestamp is not strictly newer than the last message applied on
//!   the same channel (stale, replayed or tied).

use std::collections::HashMap;
use std::sync::Arc;

use binder_engine::{
    FreshnessGate, MessageClock, MessageKind, OriginId, StateUpdate, SyncMessage, SyncPayload,
    Timestamp,
};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::local::LocalStore;
use crate::state::CollectionState;
use crate::storage::StorageEvent;
use crate::sync_client::RemoteSyncClient;

/// Sends and admits cross-tab messages for one tab.
pub struct CrossTabBroadcaster {
    origin_id: OriginId,
    clock: Arc<dyn Clock>,
    stamps: Mutex<MessageClock>,
    gates: Mutex<HashMap<MessageKind, FreshnessGate>>,
    local: LocalStore,
}

impl CrossTabBroadcaster {
    /// Create a broadcaster with a fresh origin ID.
    pub fn new(local: LocalStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            origin_id: uuid::Uuid::new_v4().to_string(),
            clock,
            stamps: Mutex::new(MessageClock::new()),
            gates: Mutex::new(HashMap::new()),
            local,
        }
    }

    /// This tab's unique ID.
    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    /// Seed the freshness gates from the last message stored on each
    /// channel, so a tab opened later never replays the backlog.
    pub async fn prime(&self) {
        for kind in MessageKind::ALL {
            if let Some(message) = self.local.load_message(kind).await {
                self.gates
                    .lock()
                    .insert(kind, FreshnessGate::starting_at(message.timestamp));
            }
        }
    }

    /// Stamp and write a message for sibling tabs.
    pub fn broadcast(&self, payload: SyncPayload) -> SyncMessage {
        let timestamp = self.stamps.lock().stamp(self.clock.now_ms());
        let message = SyncMessage::new(payload, timestamp, self.origin_id.clone());
        self.local.write_message(&message);

        tracing::debug!(
            kind = message.kind().as_str(),
            timestamp = timestamp,
            "Broadcast to sibling tabs"
        );
        message
    }

    /// Decide whether an inbound message should be applied, advancing the
    /// channel's gate if so.
    pub fn admit(&self, message: &SyncMessage) -> bool {
        if message.origin_id == self.origin_id {
            tracing::trace!(kind = message.kind().as_str(), "Ignoring own message");
            return false;
        }

        let kind = message.kind();
        let mut gates = self.gates.lock();
        let gate = gates.entry(kind).or_default();
        if !gate.admit(message.timestamp) {
            tracing::debug!(
                kind = kind.as_str(),
                timestamp = message.timestamp,
                last_applied = gate.last_applied(),
                "Ignoring stale message"
            );
            return false;
        }
        true
    }

    /// Parse a storage event into an admitted message.
    ///
    /// Returns `None` for unrelated keys, removals, malformed values, and
    /// messages that fail [`admit`](Self::admit).
    pub fn accept(&self, event: &StorageEvent) -> Option<SyncMessage> {
        let kind = MessageKind::from_storage_key(&event.key)?;
        let raw = event.new_value.as_deref()?;

        let message = match SyncMessage::from_json(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(key = %event.key, error = %e, "Ignoring malformed sync message");
                return None;
            }
        };
        if message.kind() != kind {
            tracing::warn!(key = %event.key, "Sync message written to the wrong channel");
            return None;
        }

        self.admit(&message).then_some(message)
    }

    /// Timestamp of the last message applied on a channel.
    pub fn last_applied(&self, kind: MessageKind) -> Timestamp {
        self.gates
            .lock()
            .get(&kind)
            .map_or(0, FreshnessGate::last_applied)
    }

    /// Spawn the task that replays inbound messages into this tab.
    pub(crate) fn listen(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StorageEvent>,
        state: CollectionState,
        client: Arc<RemoteSyncClient>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(message) = self.accept(&event) {
                            apply(message.payload, &state, &client);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // The durable last message per channel is enough to
                        // catch up: every payload is a full snapshot.
                        tracing::warn!(skipped = skipped, "Storage events lagged; catching up");
                        for kind in MessageKind::ALL {
                            if let Some(message) = self.local.load_message(kind).await {
                                if self.admit(&message) {
                                    apply(message.payload, &state, &client);
                                }
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Apply an admitted payload. Nothing here persists, broadcasts or
/// schedules a sync: the sending tab already did all of that.
fn apply(payload: SyncPayload, state: &CollectionState, client: &RemoteSyncClient) {
    match payload {
        SyncPayload::CollectionUpdated(collection) => {
            if state.replace(collection) {
                tracing::debug!("Applied collection from sibling tab");
            }
        }
        SyncPayload::StateUpdated(StateUpdate::LastSync(timestamp)) => {
            client.observe_last_sync(timestamp);
        }
        SyncPayload::StateUpdated(StateUpdate::SignedOut) => {
            tracing::info!("Sibling tab signed out; clearing local state");
            state.clear();
            client.forget();
        }
    }
}
