//! Change queue - durable record of snapshots not yet written remotely.
//!
//! Entries are full collection snapshots, so a newer entry supersedes every
//! older one. The queue therefore holds at most one pending snapshot, but it
//! keeps a FIFO shape so flushing and acknowledgement stay ordered.

use crate::{error::Result, Collection, Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What a pending change does once replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Write a full collection snapshot
    CollectionUpdate,
}

/// A snapshot waiting for a successful remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Change type
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Snapshot to write
    pub payload: Collection,
    /// When the change was queued (milliseconds since epoch)
    pub enqueued_at: Timestamp,
}

impl PendingChange {
    /// Create a collection update entry.
    pub fn collection_update(payload: Collection, enqueued_at: Timestamp) -> Self {
        Self {
            kind: ChangeKind::CollectionUpdate,
            payload,
            enqueued_at,
        }
    }
}

/// FIFO log of pending changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeQueue {
    entries: VecDeque<PendingChange>,
}

impl ChangeQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append a change.
    ///
    /// Older collection snapshots are superseded and dropped, so the queue
    /// never replays history.
    pub fn enqueue(&mut self, change: PendingChange) {
        match change.kind {
            ChangeKind::CollectionUpdate => self
                .entries
                .retain(|entry| entry.kind != ChangeKind::CollectionUpdate),
        }
        self.entries.push_back(change);
    }

    /// The oldest entry, next in line to flush.
    pub fn front(&self) -> Option<&PendingChange> {
        self.entries.front()
    }

    /// Remove the entry that was flushed.
    ///
    /// Matching on `enqueued_at` keeps an entry that was enqueued while the
    /// flush was in flight. Returns whether an entry was removed.
    pub fn acknowledge(&mut self, enqueued_at: Timestamp) -> bool {
        match self.entries.front() {
            Some(front) if front.enqueued_at == enqueued_at => {
                self.entries.pop_front();
                true
            }
            _ => false,
        }
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries.iter()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidQueue(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// A log written by an older build may still hold several snapshots;
    /// they are collapsed on load.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<PendingChange> =
            serde_json::from_str(json).map_err(|e| Error::InvalidQueue(e.to_string()))?;
        let mut queue = Self::new();
        for entry in entries {
            queue.enqueue(entry);
        }
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(card: &str, normal: u32) -> Collection {
        let mut collection = Collection::new();
        collection.add(card, normal, false);
        collection
    }

    #[test]
    fn enqueue_collapses_to_latest() {
        let mut queue = ChangeQueue::new();
        queue.enqueue(PendingChange::collection_update(snapshot("a", 1), 10));
        queue.enqueue(PendingChange::collection_update(snapshot("a", 2), 20));

        assert_eq!(queue.len(), 1);
        let front = queue.front().unwrap();
        assert_eq!(front.enqueued_at, 20);
        assert_eq!(front.payload.quantity_of("a"), 2);
    }

    #[test]
    fn acknowledge_removes_matching_front() {
        let mut queue = ChangeQueue::new();
        queue.enqueue(PendingChange::collection_update(snapshot("a", 1), 10));

        assert!(!queue.acknowledge(99));
        assert_eq!(queue.len(), 1);
        assert!(queue.acknowledge(10));
        assert!(queue.is_empty());
    }

    #[test]
    fn acknowledge_keeps_entry_enqueued_during_flush() {
        let mut queue = ChangeQueue::new();
        queue.enqueue(PendingChange::collection_update(snapshot("a", 1), 10));
        let flushing = queue.front().unwrap().enqueued_at;

        // A newer snapshot lands while the write for `flushing` is in flight.
        queue.enqueue(PendingChange::collection_update(snapshot("a", 2), 20));

        assert!(!queue.acknowledge(flushing));
        assert_eq!(queue.front().unwrap().enqueued_at, 20);
    }

    #[test]
    fn json_shape() {
        let mut queue = ChangeQueue::new();
        queue.enqueue(PendingChange::collection_update(snapshot("a", 1), 10));

        let json = queue.to_json().unwrap();
        assert_eq!(
            json,
            r#"[{"type":"collection_update","payload":{"a":{"normal":1,"foil":0}},"enqueuedAt":10}]"#
        );
        assert_eq!(ChangeQueue::from_json(&json).unwrap(), queue);
    }

    #[test]
    fn from_json_collapses_legacy_history() {
        let json = r#"[
            {"type":"collection_update","payload":{"a":{"normal":1,"foil":0}},"enqueuedAt":1},
            {"type":"collection_update","payload":{"a":{"normal":3,"foil":0}},"enqueuedAt":2}
        ]"#;
        let queue = ChangeQueue::from_json(json).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.front().unwrap().payload.quantity_of("a"), 3);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            ChangeQueue::from_json("not json"),
            Err(Error::InvalidQueue(_))
        ));
    }
}
