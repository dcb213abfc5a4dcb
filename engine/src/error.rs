//! Error types for the Binder engine.

use thiserror::Error;

/// All possible errors from the Binder engine.
///
/// Collection mutations never fail; errors only come from decoding
/// persisted or transmitted documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported format version: {found} (max supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },

    #[error("invalid sync message: {0}")]
    InvalidMessage(String),

    #[error("invalid pending change log: {0}")]
    InvalidQueue(String),

    #[error("count out of range for card '{card_id}': {value}")]
    CountOutOfRange { card_id: String, value: i64 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
