//! Collection - the owned-card inventory.
//!
//! A [`Collection`] maps opaque card IDs to [`CardQuantity`] counters. It is
//! the unit of synchronization: merge, broadcast and persistence always work
//! on whole snapshots, never on per-card deltas.

use crate::{CardId, CardQuantity, Variant};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The user's owned cards.
///
/// Invariant: no entry has both counters at zero. Mutations delete an entry
/// as soon as it becomes empty, and deserialization drops empty entries.
///
/// Uses BTreeMap for deterministic serialization order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Collection {
    cards: BTreeMap<CardId, CardQuantity>,
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let cards = BTreeMap::<CardId, CardQuantity>::deserialize(deserializer)?;
        Ok(Self::from_entries(cards))
    }
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            cards: BTreeMap::new(),
        }
    }

    /// Build a collection from raw entries, dropping empty quantities.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CardQuantity)>,
        K: Into<CardId>,
    {
        let cards = entries
            .into_iter()
            .map(|(id, qty)| (id.into(), qty))
            .filter(|(_, qty)| !qty.is_empty())
            .collect();
        Self { cards }
    }

    /// Add `count` copies of a card, creating the entry if absent.
    ///
    /// The card ID is not validated against any catalog. Returns `false`
    /// only when `count` is zero.
    pub fn add(&mut self, card_id: &str, count: u32, foil: bool) -> bool {
        if count == 0 {
            return false;
        }
        self.cards
            .entry(card_id.to_string())
            .or_default()
            .add(Variant::from_foil(foil), count);
        true
    }

    /// Remove up to `count` copies of a card, clamped at zero.
    ///
    /// The entry is deleted once both counters reach zero. Removing from an
    /// absent card is a no-op. Returns whether anything changed.
    pub fn remove(&mut self, card_id: &str, count: u32, foil: bool) -> bool {
        let Some(qty) = self.cards.get_mut(card_id) else {
            return false;
        };
        let removed = qty.remove(Variant::from_foil(foil), count);
        if qty.is_empty() {
            self.cards.remove(card_id);
        }
        removed > 0
    }

    /// Regular copies owned; 0 for unknown cards.
    pub fn quantity_of(&self, card_id: &str) -> u32 {
        self.cards.get(card_id).map_or(0, |q| q.normal)
    }

    /// Foil copies owned; 0 for unknown cards.
    pub fn foil_quantity_of(&self, card_id: &str) -> u32 {
        self.cards.get(card_id).map_or(0, |q| q.foil)
    }

    /// Get the full quantity entry for a card.
    pub fn get(&self, card_id: &str) -> Option<&CardQuantity> {
        self.cards.get(card_id)
    }

    /// Check if the card has an entry.
    pub fn contains(&self, card_id: &str) -> bool {
        self.cards.contains_key(card_id)
    }

    /// Iterate entries in card ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&CardId, &CardQuantity)> {
        self.cards.iter()
    }

    /// Number of distinct cards owned.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check if nothing is owned.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// Derived aggregates over the whole collection.
    pub fn stats(&self) -> CollectionStats {
        let mut stats = CollectionStats {
            unique_cards: self.cards.len(),
            ..CollectionStats::default()
        };
        for qty in self.cards.values() {
            stats.normal_cards += u64::from(qty.normal);
            stats.foil_cards += u64::from(qty.foil);
        }
        stats.total_cards = stats.normal_cards + stats.foil_cards;
        stats
    }

    /// Set the stored quantity for a card, removing the entry if empty.
    pub(crate) fn put(&mut self, card_id: CardId, qty: CardQuantity) {
        if qty.is_empty() {
            self.cards.remove(&card_id);
        } else {
            self.cards.insert(card_id, qty);
        }
    }
}

impl<K: Into<CardId>> FromIterator<(K, CardQuantity)> for Collection {
    fn from_iter<T: IntoIterator<Item = (K, CardQuantity)>>(iter: T) -> Self {
        Self::from_entries(iter)
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = (&'a CardId, &'a CardQuantity);
    type IntoIter = std::collections::btree_map::Iter<'a, CardId, CardQuantity>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

/// Aggregate counts over a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    /// Distinct cards with at least one copy
    pub unique_cards: usize,
    /// Regular copies across all cards
    pub normal_cards: u64,
    /// Foil copies across all cards
    pub foil_cards: u64,
    /// All copies
    pub total_cards: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_creates_entry() {
        let mut collection = Collection::new();
        assert!(collection.add("card-1", 2, false));

        assert_eq!(collection.quantity_of("card-1"), 2);
        assert_eq!(collection.foil_quantity_of("card-1"), 0);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn add_zero_is_noop() {
        let mut collection = Collection::new();
        assert!(!collection.add("card-1", 0, false));
        assert!(!collection.contains("card-1"));
    }

    #[test]
    fn foil_add_then_remove_deletes_entry() {
        let mut collection = Collection::new();
        collection.add("card-1", 1, true);
        assert!(collection.remove("card-1", 1, true));

        assert!(collection.get("card-1").is_none());
        assert!(collection.is_empty());
    }

    #[test]
    fn remove_more_than_owned_clamps_and_deletes() {
        let mut collection = Collection::new();
        collection.add("card-1", 2, false);
        assert!(collection.remove("card-1", 10, false));
        assert!(!collection.contains("card-1"));
    }

    #[test]
    fn remove_one_variant_keeps_other() {
        let mut collection = Collection::new();
        collection.add("card-1", 1, false);
        collection.add("card-1", 1, true);
        collection.remove("card-1", 1, false);

        assert_eq!(collection.get("card-1"), Some(&CardQuantity::new(0, 1)));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut collection = Collection::new();
        assert!(!collection.remove("missing", 1, false));
        assert!(collection.is_empty());
    }

    #[test]
    fn remove_variant_with_zero_count_reports_unchanged() {
        let mut collection = Collection::new();
        collection.add("card-1", 1, false);
        assert!(!collection.remove("card-1", 1, true));
        assert_eq!(collection.quantity_of("card-1"), 1);
    }

    #[test]
    fn reads_default_to_zero() {
        let collection = Collection::new();
        assert_eq!(collection.quantity_of("nope"), 0);
        assert_eq!(collection.foil_quantity_of("nope"), 0);
    }

    #[test]
    fn deserialization_drops_empty_entries() {
        let json = r#"{"a":{"normal":0,"foil":0},"b":{"normal":1,"foil":0}}"#;
        let collection: Collection = serde_json::from_str(json).unwrap();

        assert!(!collection.contains("a"));
        assert_eq!(collection.quantity_of("b"), 1);
    }

    #[test]
    fn negative_counts_fail_to_deserialize() {
        let json = r#"{"a":{"normal":-1,"foil":0}}"#;
        assert!(serde_json::from_str::<Collection>(json).is_err());
    }

    #[test]
    fn serialization_is_a_plain_map() {
        let mut collection = Collection::new();
        collection.add("b", 1, true);
        collection.add("a", 2, false);

        let json = serde_json::to_string(&collection).unwrap();
        assert_eq!(
            json,
            r#"{"a":{"normal":2,"foil":0},"b":{"normal":0,"foil":1}}"#
        );
    }

    #[test]
    fn stats_aggregate() {
        let mut collection = Collection::new();
        collection.add("a", 3, false);
        collection.add("a", 1, true);
        collection.add("b", 2, true);

        let stats = collection.stats();
        assert_eq!(stats.unique_cards, 2);
        assert_eq!(stats.normal_cards, 3);
        assert_eq!(stats.foil_cards, 3);
        assert_eq!(stats.total_cards, 6);
    }

    #[test]
    fn from_entries_normalizes() {
        let collection = Collection::from_entries([
            ("a", CardQuantity::new(0, 0)),
            ("b", CardQuantity::new(0, 2)),
        ]);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.foil_quantity_of("b"), 2);
    }
}
