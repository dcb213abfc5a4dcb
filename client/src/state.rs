//! Collection state - the authoritative in-memory snapshot of one tab.
//!
//! Mutations are synchronous and applied in call order. Observers subscribe
//! to a `watch` receiver and are woken only when the collection actually
//! changed.

use std::sync::Arc;

use binder_engine::{reconcile, Collection, CollectionStats, ReconcileResult};
use tokio::sync::watch;

/// Shared handle to the current collection. Clones share state.
#[derive(Debug, Clone)]
pub struct CollectionState {
    tx: Arc<watch::Sender<Collection>>,
}

impl CollectionState {
    pub fn new(initial: Collection) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Add copies of a card. Returns whether the collection changed.
    pub fn add(&self, card_id: &str, count: u32, foil: bool) -> bool {
        self.tx
            .send_if_modified(|collection| collection.add(card_id, count, foil))
    }

    /// Remove copies of a card. Returns whether the collection changed.
    pub fn remove(&self, card_id: &str, count: u32, foil: bool) -> bool {
        self.tx
            .send_if_modified(|collection| collection.remove(card_id, count, foil))
    }

    /// Replace the whole collection. Returns whether it changed.
    pub fn replace(&self, next: Collection) -> bool {
        self.tx.send_if_modified(|collection| {
            if *collection == next {
                return false;
            }
            *collection = next;
            true
        })
    }

    /// Merge `other` into the current collection atomically.
    ///
    /// Reconciling against the value under the channel lock means a
    /// mutation racing with a remote fetch is never lost.
    pub fn merge_in(&self, other: &Collection) -> ReconcileResult {
        let mut outcome = None;
        self.tx.send_if_modified(|collection| {
            let result = reconcile(collection, other);
            let changed = result.needs_pull();
            if changed {
                *collection = result.merged.clone();
            }
            outcome = Some(result);
            changed
        });
        // send_if_modified always runs the closure.
        outcome.unwrap_or_else(|| reconcile(&self.snapshot(), other))
    }

    pub fn clear(&self) -> bool {
        self.replace(Collection::new())
    }

    pub fn quantity_of(&self, card_id: &str) -> u32 {
        self.tx.borrow().quantity_of(card_id)
    }

    pub fn foil_quantity_of(&self, card_id: &str) -> u32 {
        self.tx.borrow().foil_quantity_of(card_id)
    }

    pub fn stats(&self) -> CollectionStats {
        self.tx.borrow().stats()
    }

    /// A copy of the current collection.
    pub fn snapshot(&self) -> Collection {
        self.tx.borrow().clone()
    }

    /// Observe changes.
    pub fn subscribe(&self) -> watch::Receiver<Collection> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binder_engine::CardQuantity;

    #[test]
    fn mutations_notify_only_on_change() {
        let state = CollectionState::new(Collection::new());
        let rx = state.subscribe();

        assert!(!state.remove("missing", 1, false));
        assert!(!rx.has_changed().unwrap());

        assert!(state.add("card-1", 2, false));
        assert!(rx.has_changed().unwrap());
        assert_eq!(state.quantity_of("card-1"), 2);
    }

    #[test]
    fn replace_identical_is_silent() {
        let mut initial = Collection::new();
        initial.add("a", 1, true);
        let state = CollectionState::new(initial.clone());
        let rx = state.subscribe();

        assert!(!state.replace(initial));
        assert!(!rx.has_changed().unwrap());
        assert!(state.clear());
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn merge_in_raises_and_reports() {
        let state = CollectionState::new(Collection::from_entries([(
            "A",
            CardQuantity::new(3, 0),
        )]));
        let remote = Collection::from_entries([
            ("A", CardQuantity::new(1, 2)),
            ("B", CardQuantity::new(1, 0)),
        ]);

        let result = state.merge_in(&remote);
        assert!(result.needs_pull());
        assert!(result.needs_push());
        assert_eq!(state.foil_quantity_of("A"), 2);
        assert_eq!(state.quantity_of("A"), 3);
        assert_eq!(state.quantity_of("B"), 1);
    }

    #[test]
    fn merge_in_with_empty_remote_keeps_local() {
        let state = CollectionState::new(Collection::from_entries([(
            "A",
            CardQuantity::new(3, 0),
        )]));
        let result = state.merge_in(&Collection::new());
        assert!(!result.needs_pull());
        assert!(result.needs_push());
        assert_eq!(state.quantity_of("A"), 3);
    }
}
