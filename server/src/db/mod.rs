//! Database module for PostgreSQL persistence.

mod collections;
mod pool;
mod sessions;

pub use collections::*;
pub use pool::*;
pub use sessions::*;
