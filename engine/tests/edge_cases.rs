//! Edge case tests for binder-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use binder_engine::{
    merge, reconcile, CardQuantity, ChangeQueue, Collection, CollectionExport, FreshnessGate,
    MessageClock, PendingChange, StateUpdate, SyncMessage, SyncPayload,
};
use proptest::prelude::*;

// ============================================================================
// Card ID Edge Cases
// ============================================================================

#[test]
fn card_ids_are_opaque() {
    let mut collection = Collection::new();

    let ids = vec![
        "",
        "日本語カード",
        "🎴🃏",
        "with spaces and\ttabs",
        "sync:collection:updated",
        "Null\0Test",
    ];

    for id in &ids {
        collection.add(id, 1, false);
    }
    assert_eq!(collection.len(), ids.len());

    let json = serde_json::to_string(&collection).unwrap();
    let parsed: Collection = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, collection);
}

#[test]
fn very_long_card_id() {
    let long_id = "x".repeat(64 * 1024);
    let mut collection = Collection::new();
    collection.add(&long_id, 1, true);
    assert_eq!(collection.foil_quantity_of(&long_id), 1);
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn counts_saturate_instead_of_overflowing() {
    let mut collection = Collection::new();
    collection.add("card", u32::MAX, false);
    collection.add("card", 10, false);
    assert_eq!(collection.quantity_of("card"), u32::MAX);
    assert_eq!(collection.stats().total_cards, u64::from(u32::MAX));
}

#[test]
fn remove_max_count() {
    let mut collection = Collection::new();
    collection.add("card", 3, false);
    collection.remove("card", u32::MAX, false);
    assert!(!collection.contains("card"));
}

#[test]
fn clock_stamp_high_values() {
    let mut clock = MessageClock::new();
    clock.stamp(u64::MAX - 1);
    assert_eq!(clock.stamp(0), u64::MAX);
    // Saturates instead of wrapping to zero.
    assert_eq!(clock.stamp(0), u64::MAX);
}

// ============================================================================
// Spec Scenarios
// ============================================================================

#[test]
fn add_two_normal_copies() {
    let mut collection = Collection::new();
    collection.add("card-1", 2, false);
    assert_eq!(collection.quantity_of("card-1"), 2);
    assert_eq!(collection.foil_quantity_of("card-1"), 0);
}

#[test]
fn merge_example() {
    let local = Collection::from_entries([("A", CardQuantity::new(3, 0))]);
    let remote = Collection::from_entries([
        ("A", CardQuantity::new(1, 2)),
        ("B", CardQuantity::new(1, 0)),
    ]);

    let expected = Collection::from_entries([
        ("A", CardQuantity::new(3, 2)),
        ("B", CardQuantity::new(1, 0)),
    ]);
    assert_eq!(merge(&local, &remote), expected);
}

#[test]
fn stale_message_from_other_tab_is_ignored() {
    let mut gate = FreshnessGate::starting_at(100);
    let from_t2 = SyncMessage::new(
        SyncPayload::CollectionUpdated(Collection::new()),
        90,
        "y",
    );
    assert!(!gate.admit(from_t2.timestamp));
}

#[test]
fn replayed_message_applies_once() {
    let msg = SyncMessage::new(
        SyncPayload::StateUpdated(StateUpdate::LastSync(7)),
        8,
        "tab",
    );
    let mut gate = FreshnessGate::new();
    let applied = (0..3).filter(|_| gate.admit(msg.timestamp)).count();
    assert_eq!(applied, 1);
}

// ============================================================================
// Malformed Data
// ============================================================================

#[test]
fn malformed_persisted_values() {
    for bad in ["", "null", "[]", "{\"a\": 1}", "{\"a\": {\"normal\": \"x\"}}"] {
        assert!(
            serde_json::from_str::<Collection>(bad).is_err(),
            "accepted: {bad}"
        );
    }
    assert!(ChangeQueue::from_json("{}").is_err());
    assert!(CollectionExport::from_json("[]").is_err());
}

#[test]
fn missing_fields_default_to_zero_are_rejected() {
    // Both counters are required on the wire.
    assert!(serde_json::from_str::<Collection>(r#"{"a":{"normal":1}}"#).is_err());
}

#[test]
fn empty_queue_round_trip() {
    let queue = ChangeQueue::new();
    assert_eq!(queue.to_json().unwrap(), "[]");
    assert!(ChangeQueue::from_json("[]").unwrap().is_empty());
}

#[test]
fn pending_change_keeps_exact_snapshot() {
    let mut collection = Collection::new();
    collection.add("a", 1, true);
    let mut queue = ChangeQueue::new();
    queue.enqueue(PendingChange::collection_update(collection.clone(), 1));

    let restored = ChangeQueue::from_json(&queue.to_json().unwrap()).unwrap();
    assert_eq!(restored.front().unwrap().payload, collection);
}

// ============================================================================
// Properties over mutation sequences
// ============================================================================

#[derive(Debug, Clone)]
enum Mutation {
    Add(String, u32, bool),
    Remove(String, u32, bool),
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    let id = prop_oneof![Just("a"), Just("b"), Just("c")].prop_map(String::from);
    prop_oneof![
        (id.clone(), 0u32..4, any::<bool>()).prop_map(|(i, n, f)| Mutation::Add(i, n, f)),
        (id, 0u32..4, any::<bool>()).prop_map(|(i, n, f)| Mutation::Remove(i, n, f)),
    ]
}

fn apply_all(mutations: &[Mutation]) -> Collection {
    let mut collection = Collection::new();
    for mutation in mutations {
        match mutation {
            Mutation::Add(id, n, foil) => collection.add(id, *n, *foil),
            Mutation::Remove(id, n, foil) => collection.remove(id, *n, *foil),
        };
    }
    collection
}

proptest! {
    #[test]
    fn prop_no_empty_entries(mutations in prop::collection::vec(arb_mutation(), 0..40)) {
        let collection = apply_all(&mutations);
        for (_, qty) in collection.iter() {
            prop_assert!(!qty.is_empty());
        }
    }

    #[test]
    fn prop_export_import_round_trip(mutations in prop::collection::vec(arb_mutation(), 0..40)) {
        let collection = apply_all(&mutations);
        let export = CollectionExport::new(collection.clone(), 42);
        let imported = CollectionExport::from_json(&export.to_json().unwrap()).unwrap();
        prop_assert_eq!(imported.collection, collection);
    }

    #[test]
    fn prop_merge_with_empty_never_loses_local(mutations in prop::collection::vec(arb_mutation(), 0..40)) {
        let local = apply_all(&mutations);
        let result = reconcile(&local, &Collection::new());
        prop_assert_eq!(&result.merged, &local);
        prop_assert!(!result.needs_pull());
        prop_assert_eq!(result.needs_push(), !local.is_empty());
    }
}
