//! Physical time with millisecond precision
//!
//! All expiry math in Veil works on Unix-epoch milliseconds. Components never
//! read the wall clock directly; they receive a [`crate::ClockEffects`] handle
//! and do arithmetic on the `PhysicalTime` values it returns, which keeps
//! deadline and TTL logic deterministic under test clocks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in physical time, as milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct PhysicalTime {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// Create a timestamp from epoch milliseconds.
    pub fn from_ms(ts_ms: u64) -> Self {
        Self { ts_ms }
    }

    /// Advance by `ms` milliseconds, saturating at `u64::MAX`.
    pub fn add_ms(&self, ms: u64) -> Self {
        Self {
            ts_ms: self.ts_ms.saturating_add(ms),
        }
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn since(&self, earlier: PhysicalTime) -> u64 {
        self.ts_ms.saturating_sub(earlier.ts_ms)
    }

    /// Strictly before `other`.
    pub fn is_before(&self, other: PhysicalTime) -> bool {
        self.ts_ms < other.ts_ms
    }

    /// At or after `other`. Deadline checks use this form so that the
    /// deadline instant itself counts as past.
    pub fn is_at_or_after(&self, other: PhysicalTime) -> bool {
        self.ts_ms >= other.ts_ms
    }
}

impl fmt::Display for PhysicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.ts_ms)
    }
}

/// Common duration constants, in milliseconds.
pub mod durations {
    /// One second.
    pub const SECOND_MS: u64 = 1_000;
    /// One minute.
    pub const MINUTE_MS: u64 = 60 * SECOND_MS;
    /// One hour.
    pub const HOUR_MS: u64 = 60 * MINUTE_MS;
    /// One day.
    pub const DAY_MS: u64 = 24 * HOUR_MS;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_ms_saturates() {
        let t = PhysicalTime::from_ms(u64::MAX - 5);
        assert_eq!(t.add_ms(100).ts_ms, u64::MAX);
    }

    #[test]
    fn test_since_saturates_at_zero() {
        let early = PhysicalTime::from_ms(100);
        let late = PhysicalTime::from_ms(500);
        assert_eq!(late.since(early), 400);
        assert_eq!(early.since(late), 0);
    }

    #[test]
    fn test_deadline_boundary_is_inclusive() {
        let deadline = PhysicalTime::from_ms(1_000);
        assert!(!PhysicalTime::from_ms(999).is_at_or_after(deadline));
        assert!(PhysicalTime::from_ms(1_000).is_at_or_after(deadline));
        assert!(PhysicalTime::from_ms(1_001).is_at_or_after(deadline));
    }
}
