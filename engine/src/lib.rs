//! # Binder Engine
//!
//! A deterministic sync core for an offline-first card collection.
//!
//! This crate holds the pure logic behind keeping one user's owned cards
//! consistent across an in-memory copy, a remote store, and sibling tabs
//! editing the same local state. It never touches files, sockets or timers;
//! the `binder-client` crate drives it.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Collection
//!
//! A [`Collection`] maps opaque card IDs to a [`CardQuantity`] of regular
//! and foil copies. Entries that reach zero on both counters are deleted,
//! never stored as zero.
//!
//! ### Merge
//!
//! [`merge`] takes the per-card, per-variant maximum of two snapshots. It is
//! commutative, associative and idempotent, so repeated or out-of-order
//! merges are safe. [`reconcile`] additionally reports which side must be
//! updated.
//!
//! ### Pending changes
//!
//! A [`ChangeQueue`] durably records snapshots that could not be written
//! remotely. Newer snapshots supersede older ones.
//!
//! ### Cross-tab messages
//!
//! A [`SyncMessage`] carries a [`SyncPayload`] between tabs. The
//! [`MessageClock`] stamps outgoing messages; a [`FreshnessGate`] rejects
//! stale or replayed ones.
//!
//! ## Quick Start
//!
//! ```rust
//! use binder_engine::{merge, CardQuantity, Collection};
//!
//! let mut local = Collection::new();
//! local.add("card-1", 3, false);
//!
//! let remote = Collection::from_entries([
//!     ("card-1", CardQuantity::new(1, 2)),
//!     ("card-2", CardQuantity::new(1, 0)),
//! ]);
//!
//! let merged = merge(&local, &remote);
//! assert_eq!(merged.quantity_of("card-1"), 3);
//! assert_eq!(merged.foil_quantity_of("card-1"), 2);
//! assert_eq!(merged.quantity_of("card-2"), 1);
//! ```
//!
//! ## Persistence
//!
//! Use [`CollectionExport`] to move a collection in and out as JSON, and
//! [`ChangeQueue::to_json`] / [`ChangeQueue::from_json`] for the pending log.

pub mod clock;
pub mod collection;
pub mod error;
pub mod message;
pub mod quantity;
pub mod queue;
pub mod reconcile;
pub mod result;
pub mod snapshot;
pub mod wire;

// Re-export main types at crate root
pub use clock::{FreshnessGate, MessageClock};
pub use collection::{Collection, CollectionStats};
pub use error::Error;
pub use message::{MessageKind, StateUpdate, SyncMessage, SyncPayload, MESSAGE_KEY_PREFIX};
pub use quantity::{CardQuantity, Variant};
pub use queue::{ChangeKind, ChangeQueue, PendingChange};
pub use reconcile::{merge, reconcile, ReconcileResult};
pub use result::{SyncReason, SyncResult};
pub use snapshot::{CollectionExport, EXPORT_FORMAT_VERSION};

/// Type aliases for clarity
pub type CardId = String;
pub type OriginId = String;
pub type UserId = String;
pub type Timestamp = u64;
