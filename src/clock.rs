//! Monotonic time source.
//!
//! Reporters never read the wall clock directly. Whenever they need "now"
//! (e.g. when a frame is finalized without ever having been terminated) they
//! ask the `TickClock` they were built with. All timestamps are nanoseconds on
//! an arbitrary monotonic time base.

use std::cell::Cell;
use std::time::Instant;

/// A point in time, in nanoseconds.
pub type Timestamp = u64;

/// A duration, in nanoseconds.
pub type Duration = u64;

pub const NANOS_PER_MICRO: u64 = 1_000;
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Converts a nanosecond duration to whole microseconds.
#[inline]
pub fn as_micros(d: Duration) -> i64 {
    (d / NANOS_PER_MICRO) as i64
}

/// Signed counterpart of `as_micros`.
#[inline]
pub fn signed_micros(d: i64) -> i64 {
    d / NANOS_PER_MICRO as i64
}

/// Returns `b - a` as a signed nanosecond delta.
#[inline]
pub fn signed_delta(a: Timestamp, b: Timestamp) -> i64 {
    (b as i128 - a as i128) as i64
}

pub trait TickClock {
    fn now(&self) -> Timestamp;
}

/// Clock backed by `std::time::Instant`, counting from its creation.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_nanos() as Timestamp
    }
}

/// A clock that only moves when told to.
///
/// Used by the replay processor, which sets the time from each recorded
/// operation, and by tests.
///
/// ```
/// use frame_reporter::clock::{ManualClock, TickClock};
///
/// let clock = ManualClock::new(10);
/// clock.advance(5);
/// assert_eq!(clock.now(), 15);
/// clock.set(3);
/// assert_eq!(clock.now(), 3);
/// ```
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl TickClock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(10, 4), -6);
        assert_eq!(signed_delta(4, 10), 6);
        assert_eq!(signed_micros(-6_000), -6);
        assert_eq!(as_micros(1_999), 1);
    }

    #[test]
    fn test_monotonic_clock() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();

        assert!(b >= a);
    }
}
