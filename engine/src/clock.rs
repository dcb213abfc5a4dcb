//! Message timestamps and freshness checks for cross-tab messages.
//!
//! Every tab stamps its broadcasts with wall-clock milliseconds. Receivers
//! apply a message only if it is strictly newer than the last one they
//! applied on the same channel.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Issues strictly increasing millisecond stamps for one tab.
///
/// Stamps follow the wall clock but never repeat or go backwards, even if
/// the wall clock does or two broadcasts land in the same millisecond.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageClock {
    last: Timestamp,
}

impl MessageClock {
    /// Create a clock that has issued nothing yet.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Issue the next stamp given the current wall-clock time.
    pub fn stamp(&mut self, now: Timestamp) -> Timestamp {
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }

    /// The last issued stamp.
    pub fn last(&self) -> Timestamp {
        self.last
    }
}

/// Admission check for inbound messages on one channel.
///
/// A message is admitted only if its timestamp is strictly greater than the
/// last admitted one. Equal timestamps are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessGate {
    last_applied: Timestamp,
}

impl FreshnessGate {
    /// Create a gate that admits any non-zero timestamp.
    pub fn new() -> Self {
        Self { last_applied: 0 }
    }

    /// Create a gate that has already applied `timestamp`.
    pub fn starting_at(timestamp: Timestamp) -> Self {
        Self {
            last_applied: timestamp,
        }
    }

    /// Admit the timestamp if it is fresh, advancing the gate.
    pub fn admit(&mut self, timestamp: Timestamp) -> bool {
        if timestamp <= self.last_applied {
            return false;
        }
        self.last_applied = timestamp;
        true
    }

    /// Check freshness without advancing.
    pub fn is_fresh(&self, timestamp: Timestamp) -> bool {
        timestamp > self.last_applied
    }

    /// Timestamp of the last admitted message.
    pub fn last_applied(&self) -> Timestamp {
        self.last_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_follows_wall_clock() {
        let mut clock = MessageClock::new();
        assert_eq!(clock.stamp(100), 100);
        assert_eq!(clock.stamp(250), 250);
    }

    #[test]
    fn stamp_never_repeats() {
        let mut clock = MessageClock::new();
        assert_eq!(clock.stamp(100), 100);
        assert_eq!(clock.stamp(100), 101);
        assert_eq!(clock.stamp(100), 102);
    }

    #[test]
    fn stamp_survives_wall_clock_going_back() {
        let mut clock = MessageClock::new();
        clock.stamp(500);
        assert_eq!(clock.stamp(400), 501);
        assert_eq!(clock.last(), 501);
    }

    #[test]
    fn gate_rejects_stale_and_equal() {
        let mut gate = FreshnessGate::starting_at(100);
        assert!(!gate.admit(90));
        assert!(!gate.admit(100));
        assert!(gate.admit(101));
        assert_eq!(gate.last_applied(), 101);
    }

    #[test]
    fn gate_rejects_replay() {
        let mut gate = FreshnessGate::new();
        assert!(gate.admit(42));
        assert!(!gate.admit(42));
    }

    #[test]
    fn is_fresh_does_not_advance() {
        let gate = FreshnessGate::starting_at(10);
        assert!(gate.is_fresh(11));
        assert_eq!(gate.last_applied(), 10);
    }
}
