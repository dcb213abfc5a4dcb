//! Reconciliation of local and remote collection snapshots.
//!
//! Counts represent physical ownership edited from several devices, so the
//! merge takes the per-card, per-variant **maximum** of both sides. It is
//! never a sum and never an overwrite.
//!
//! # Properties
//!
//! - Commutative: `merge(a, b) == merge(b, a)`
//! - Idempotent: `merge(a, a) == a`
//! - Associative: `merge(merge(a, b), c) == merge(a, merge(b, c))`
//!
//! Repeated or out-of-order merges are therefore safe without any causal
//! history. The price is that an intentional decrease cannot win over a
//! stale increase held by the other side.

use crate::{CardId, Collection};
use serde::{Deserialize, Serialize};

/// Element-wise maximum of two collections.
pub fn merge(local: &Collection, remote: &Collection) -> Collection {
    let mut merged = remote.clone();
    for (card_id, qty) in local {
        let combined = match merged.get(card_id) {
            Some(existing) => existing.max(*qty),
            None => *qty,
        };
        merged.put(card_id.clone(), combined);
    }
    merged
}

/// Outcome of reconciling a local snapshot against a remote one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// The merged snapshot both sides should converge to
    pub merged: Collection,
    /// Cards whose local counts were raised by remote data
    pub raised_locally: Vec<CardId>,
    /// Cards whose remote counts must be raised by local data
    pub raised_remotely: Vec<CardId>,
}

impl ReconcileResult {
    /// True when local state must be replaced by `merged`.
    pub fn needs_pull(&self) -> bool {
        !self.raised_locally.is_empty()
    }

    /// True when the remote snapshot must be rewritten with `merged`.
    pub fn needs_push(&self) -> bool {
        !self.raised_remotely.is_empty()
    }

    /// True when both sides already agree.
    pub fn is_converged(&self) -> bool {
        !self.needs_pull() && !self.needs_push()
    }
}

/// Merge two snapshots and report which side each change flows to.
pub fn reconcile(local: &Collection, remote: &Collection) -> ReconcileResult {
    let merged = merge(local, remote);

    let raised_locally = merged
        .iter()
        .filter(|(id, qty)| local.get(id) != Some(*qty))
        .map(|(id, _)| id.clone())
        .collect();

    let raised_remotely = merged
        .iter()
        .filter(|(id, qty)| remote.get(id) != Some(*qty))
        .map(|(id, _)| id.clone())
        .collect();

    ReconcileResult {
        merged,
        raised_locally,
        raised_remotely,
    }
}
