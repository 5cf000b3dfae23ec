//! Record timestamps.
//!
//! This module provides [`Time`], the timestamp type shared by the clock
//! and every stream record: a `(seconds, nanoseconds)` pair with a total
//! order, signed microsecond differences, and microsecond shifting.

use std::fmt;

/// A record timestamp: unsigned seconds plus unsigned nanoseconds.
///
/// `Time` is totally ordered. Differences between two times are signed
/// and expressed in microseconds, which is the unit every synchronization
/// window (lead time, gap threshold) is specified in.
///
/// # Examples
///
/// ```rust
/// use lockstep::time::Time;
///
/// let t1 = Time::new(10, 500_000_000);
/// let t2 = Time::new(11, 0);
///
/// assert!(t1 < t2);
/// assert_eq!(t2.diff_us(t1), 500_000);
/// assert_eq!(t1.shifted_us(500_000), t2);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    /// Whole seconds.
    pub secs: u32,
    /// Nanoseconds part (`0..1_000_000_000`).
    pub nanos: u32,
}

const NANOS_PER_SEC: i64 = 1_000_000_000;

impl Time {
    /// Zero time.
    pub const ZERO: Self = Self { secs: 0, nanos: 0 };

    /// Create a time from seconds and nanoseconds.
    #[inline]
    pub const fn new(secs: u32, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// Create a time from whole microseconds.
    #[inline]
    pub const fn from_micros(us: u64) -> Self {
        Self {
            secs: (us / 1_000_000) as u32,
            nanos: ((us % 1_000_000) * 1_000) as u32,
        }
    }

    /// Signed difference `self - other` in microseconds, truncated toward
    /// zero from the nanosecond-exact difference.
    #[inline]
    pub fn diff_us(self, other: Time) -> i64 {
        let lhs = self.secs as i64 * NANOS_PER_SEC + self.nanos as i64;
        let rhs = other.secs as i64 * NANOS_PER_SEC + other.nanos as i64;
        (lhs - rhs) / 1_000
    }

    /// Shift by a signed number of microseconds, carrying between the
    /// seconds and nanoseconds fields.
    #[inline]
    pub fn shifted_us(self, us: i64) -> Time {
        let total = self.secs as i64 * NANOS_PER_SEC + self.nanos as i64 + us * 1_000;
        debug_assert!(total >= 0, "time shifted before epoch");
        Self {
            secs: (total / NANOS_PER_SEC) as u32,
            nanos: (total % NANOS_PER_SEC) as u32,
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.secs, self.nanos)
    }
}
