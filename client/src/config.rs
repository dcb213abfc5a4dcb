//! Configuration management for the client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default quiet period before a local change is written remotely.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Default period of the safety-net sync.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Default namespace for persisted keys.
pub const DEFAULT_KEY_PREFIX: &str = "binder";

/// Exponential backoff for failed remote attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure; zero disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each later one
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Timing and naming knobs of one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before saving
    pub debounce: Duration,
    /// Period of the background sync
    pub sync_interval: Duration,
    /// Backoff for attempts that failed while online
    pub retry: RetryPolicy,
    /// Namespace for `{prefix}-collection` and friends
    pub key_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            retry: RetryPolicy::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote store base URL; `None` runs local-only
    pub server_url: Option<String>,
    /// Directory for the file-backed local store
    pub storage_dir: PathBuf,
    /// User to sign in as on startup
    pub user_id: Option<String>,
    /// Bearer token for the remote store (defaults to the user ID)
    pub token: Option<String>,
    /// Scheduler timing and key namespace
    pub sync: SyncConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| var(key).filter(|value| !value.is_empty());

        let server_url = non_empty("BINDER_SERVER_URL");
        if let Some(url) = &server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidServerUrl);
            }
        }

        let storage_dir = non_empty("BINDER_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".binder"));

        let debounce = match non_empty("BINDER_DEBOUNCE_MS") {
            Some(value) => Duration::from_millis(
                value.parse().map_err(|_| ConfigError::InvalidDebounce)?,
            ),
            None => DEFAULT_DEBOUNCE,
        };

        let sync_interval = match non_empty("BINDER_SYNC_INTERVAL_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidSyncInterval),
            },
            None => DEFAULT_SYNC_INTERVAL,
        };

        let mut retry = RetryPolicy::default();
        if let Some(value) = non_empty("BINDER_MAX_RETRIES") {
            retry.max_retries = value.parse().map_err(|_| ConfigError::InvalidMaxRetries)?;
        }

        let key_prefix =
            non_empty("BINDER_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        Ok(Self {
            server_url,
            storage_dir,
            user_id: non_empty("BINDER_USER_ID"),
            token: non_empty("BINDER_TOKEN"),
            sync: SyncConfig {
                debounce,
                sync_interval,
                retry,
                key_prefix,
            },
        })
    }
}
