//! Microsecond timestamps and rolling windows.
//!
//! Uses the same resolution as SpacetimeDB timestamps so the server module
//! converts without loss.

use serde::{Deserialize, Serialize};

pub const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;
pub const MICROS_PER_WEEK: i64 = 7 * MICROS_PER_DAY;

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Earliest representable instant. Counting from here counts every row.
    pub const MIN: Self = Self(i64::MIN);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn minus_days(self, days: u32) -> Self {
        Self(self.0.saturating_sub(days as i64 * MICROS_PER_DAY))
    }

    pub fn plus_days(self, days: u32) -> Self {
        Self(self.0.saturating_add(days as i64 * MICROS_PER_DAY))
    }
}

/// Closed interval `[since, until]` of a rolling quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub since: Timestamp,
    pub until: Timestamp,
}

impl Window {
    /// The `days`-long window ending at `now`.
    pub fn trailing(now: Timestamp, days: u32) -> Self {
        Self {
            since: now.minus_days(days),
            until: now,
        }
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        t >= self.since && t <= self.until
    }
}
