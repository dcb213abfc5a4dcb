//! Per-card ownership counters.

use serde::{Deserialize, Serialize};

/// Which printing of a card a counter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Regular printing
    Normal,
    /// Foil printing
    Foil,
}

impl Variant {
    /// Map the `foil` flag used by the mutation API to a variant.
    pub fn from_foil(foil: bool) -> Self {
        if foil {
            Variant::Foil
        } else {
            Variant::Normal
        }
    }
}

/// How many copies of one card are owned, split by variant.
///
/// A quantity with both counters at zero is "empty"; the [`Collection`]
/// never stores empty quantities.
///
/// [`Collection`]: crate::Collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardQuantity {
    /// Regular copies owned
    pub normal: u32,
    /// Foil copies owned
    pub foil: u32,
}

impl CardQuantity {
    /// Create a quantity with explicit counters.
    pub fn new(normal: u32, foil: u32) -> Self {
        Self { normal, foil }
    }

    /// Read one counter.
    pub fn get(&self, variant: Variant) -> u32 {
        match variant {
            Variant::Normal => self.normal,
            Variant::Foil => self.foil,
        }
    }

    fn counter_mut(&mut self, variant: Variant) -> &mut u32 {
        match variant {
            Variant::Normal => &mut self.normal,
            Variant::Foil => &mut self.foil,
        }
    }

    /// Increment a counter, saturating at `u32::MAX`.
    pub fn add(&mut self, variant: Variant, count: u32) {
        let counter = self.counter_mut(variant);
        *counter = counter.saturating_add(count);
    }

    /// Decrement a counter, clamped at zero.
    ///
    /// Returns how many copies were actually removed.
    pub fn remove(&mut self, variant: Variant, count: u32) -> u32 {
        let counter = self.counter_mut(variant);
        let removed = count.min(*counter);
        *counter -= removed;
        removed
    }

    /// True when both counters are zero.
    pub fn is_empty(&self) -> bool {
        self.normal == 0 && self.foil == 0
    }

    /// Total copies across both variants.
    pub fn total(&self) -> u64 {
        u64::from(self.normal) + u64::from(self.foil)
    }

    /// Field-wise maximum of two quantities.
    pub fn max(self, other: CardQuantity) -> CardQuantity {
        CardQuantity {
            normal: self.normal.max(other.normal),
            foil: self.foil.max(other.foil),
        }
    }

    /// True when `self` is at least `other` on both counters.
    pub fn dominates(&self, other: &CardQuantity) -> bool {
        self.normal >= other.normal && self.foil >= other.foil
    }
}
