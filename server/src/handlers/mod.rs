//! Request handlers for the collection store.

mod collection;
pub mod websocket;

pub use collection::*;
