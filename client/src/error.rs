//! Error types for the client runtime.
//!
//! None of these ever escape a mutation call. Storage errors are logged and
//! swallowed, remote errors are folded into a [`SyncResult`].
//!
//! [`SyncResult`]: binder_engine::SyncResult

use binder_engine::SyncReason;

/// Failures of the persistent key-value store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Failures talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session is invalid or expired")]
    InvalidSession,

    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Expected auth conditions that must not be reported to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, RemoteError::NotAuthenticated | RemoteError::InvalidSession)
    }

    /// Map to a sync reason. `fallback` names the operation that failed.
    pub fn reason(&self, fallback: SyncReason) -> SyncReason {
        match self {
            RemoteError::NotAuthenticated => SyncReason::NotAuthenticated,
            RemoteError::InvalidSession => SyncReason::InvalidSession,
            _ => fallback,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RemoteError::Malformed(err.to_string());
        }
        match err.status() {
            Some(status) if status == reqwest::StatusCode::UNAUTHORIZED => {
                RemoteError::InvalidSession
            }
            Some(status) => RemoteError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => RemoteError::Unreachable(err.to_string()),
        }
    }
}

/// Client configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BINDER_DEBOUNCE_MS value")]
    InvalidDebounce,

    #[error("Invalid BINDER_SYNC_INTERVAL_SECS value")]
    InvalidSyncInterval,

    #[error("Invalid BINDER_MAX_RETRIES value")]
    InvalidMaxRetries,

    #[error("BINDER_SERVER_URL must start with http:// or https://")]
    InvalidServerUrl,
}

/// Top-level error for setting up and driving a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Engine error: {0}")]
    Engine(#[from] binder_engine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
