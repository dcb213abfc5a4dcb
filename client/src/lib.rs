//! # Binder Client
//!
//! The per-tab async runtime that keeps a card collection in sync.
//!
//! A [`CollectionEngine`] owns one tab's view of the collection. Local edits
//! apply immediately, persist to a [`KeyValueStore`], reach sibling tabs
//! through storage events, and are written to a [`RemoteStore`] after a
//! short quiet period. Writes that fail are queued and retried.
//!
//! ```no_run
//! use std::sync::Arc;
//! use binder_client::{
//!     AuthHandle, CollectionEngine, EngineDeps, MemoryRemote, MemoryStorage, Session, SyncConfig,
//! };
//!
//! # async fn run() {
//! let auth = AuthHandle::signed_in(Session::new("user-1", "user-1"));
//! let deps = EngineDeps::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryRemote::new()),
//!     auth,
//! );
//! let engine = CollectionEngine::start(deps, SyncConfig::default()).await;
//!
//! engine.add("card-1", 2, false);
//! assert_eq!(engine.quantity_of("card-1"), 2);
//!
//! let result = engine.sync_now().await;
//! assert!(result.success);
//! engine.shutdown().await;
//! # }
//! ```

pub mod auth;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod local;
pub mod remote;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod sync_client;

pub use auth::{AuthHandle, AuthState, Session};
pub use broadcast::CrossTabBroadcaster;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, RetryPolicy, SyncConfig};
pub use engine::{CollectionEngine, EngineDeps};
pub use error::{ClientError, ConfigError, RemoteError, StorageError};
pub use local::{LocalStore, StorageKeys};
pub use remote::{ChangeStream, HttpRemote, MemoryRemote, RemoteChange, RemoteStore};
pub use scheduler::SyncScheduler;
pub use state::CollectionState;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageEvent};
pub use sync_client::RemoteSyncClient;
