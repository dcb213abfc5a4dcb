//! Outcome of a sync attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a sync attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    /// No signed-in user
    NotAuthenticated,
    /// The session was rejected by the remote store
    InvalidSession,
    /// The tab is offline
    Offline,
    /// The remote write failed; the snapshot was queued
    SyncFailed,
    /// The remote snapshot could not be read
    LoadFailed,
}

impl SyncReason {
    /// Wire name of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::NotAuthenticated => "not_authenticated",
            SyncReason::InvalidSession => "invalid_session",
            SyncReason::Offline => "offline",
            SyncReason::SyncFailed => "sync_failed",
            SyncReason::LoadFailed => "load_failed",
        }
    }

    /// Expected conditions that must not surface as user-facing errors.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            SyncReason::NotAuthenticated | SyncReason::InvalidSession
        )
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result reported by every remote sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Whether the attempt reached the remote store and completed
    pub success: bool,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SyncReason>,
    /// Underlying error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Marks expected, non-actionable failures
    #[serde(default)]
    pub silent: bool,
    /// Distinct cards in the snapshot that was synced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_count: Option<usize>,
}

impl SyncResult {
    /// A successful attempt.
    pub fn ok(card_count: usize) -> Self {
        Self {
            success: true,
            reason: None,
            error: None,
            silent: false,
            card_count: Some(card_count),
        }
    }

    /// A failed attempt. Silence is derived from the reason.
    pub fn failed(reason: SyncReason, error: Option<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            error,
            silent: reason.is_silent(),
            card_count: None,
        }
    }

    /// Shorthand for the unauthenticated case.
    pub fn not_authenticated() -> Self {
        Self::failed(SyncReason::NotAuthenticated, None)
    }

    /// True when a later attempt may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        !self.success && !self.silent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_authenticated_is_silent() {
        let result = SyncResult::not_authenticated();
        assert!(!result.success);
        assert!(result.silent);
        assert_eq!(result.reason, Some(SyncReason::NotAuthenticated));
        assert!(!result.is_retryable());
    }

    #[test]
    fn sync_failed_is_retryable() {
        let result = SyncResult::failed(SyncReason::SyncFailed, Some("offline".to_string()));
        assert!(!result.silent);
        assert!(result.is_retryable());
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&SyncResult::not_authenticated()).unwrap();
        assert_eq!(
            json,
            r#"{"success":false,"reason":"not_authenticated","silent":true}"#
        );

        let json = serde_json::to_string(&SyncResult::ok(3)).unwrap();
        assert_eq!(json, r#"{"success":true,"silent":false,"cardCount":3}"#);
    }

    #[test]
    fn reason_display_matches_wire() {
        for reason in [
            SyncReason::NotAuthenticated,
            SyncReason::InvalidSession,
            SyncReason::Offline,
            SyncReason::SyncFailed,
            SyncReason::LoadFailed,
        ] {
            let wire = serde_json::to_string(&reason).unwrap();
            assert_eq!(wire, format!("\"{}\"", reason));
        }
    }
}
