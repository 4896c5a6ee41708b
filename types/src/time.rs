//! Epoch timestamps.
//!
//! All protocol timestamps count seconds since the network's epoch anchor,
//! not the Unix epoch. Block and transaction timestamps fit in 32 bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the network epoch anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u32);

impl Timestamp {
    /// The epoch anchor itself (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u32) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u32 {
        self.0
    }

    pub fn saturating_add(&self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn saturating_sub(&self, secs: u32) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Signed distance `self - other` in seconds.
    pub fn delta(&self, other: Timestamp) -> i64 {
        i64::from(self.0) - i64::from(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the current epoch time.
///
/// Production code uses [`SystemClock`]; tests substitute a manually driven
/// implementation so timestamp-window rules are deterministic.
pub trait EpochClock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock anchored at a network's epoch start.
pub struct SystemClock {
    anchor_unix_secs: u64,
}

impl SystemClock {
    pub fn new(anchor_unix_secs: u64) -> Self {
        Self { anchor_unix_secs }
    }
}

impl EpochClock for SystemClock {
    fn now(&self) -> Timestamp {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Timestamp::new(unix.saturating_sub(self.anchor_unix_secs) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_signed() {
        let a = Timestamp::new(100);
        let b = Timestamp::new(130);
        assert_eq!(b.delta(a), 30);
        assert_eq!(a.delta(b), -30);
    }

    #[test]
    fn saturating_ops() {
        assert_eq!(Timestamp::new(5).saturating_sub(10), Timestamp::EPOCH);
        assert_eq!(
            Timestamp::new(u32::MAX).saturating_add(1),
            Timestamp::new(u32::MAX)
        );
    }

    #[test]
    fn system_clock_after_anchor() {
        let clock = SystemClock::new(0);
        assert!(clock.now().as_secs() > 0);
    }
}
