//! Time intervals.
//!
//! Stages and Viz breakdown entries are closed time intervals `[start, end]`
//! with `start <= end`. Intervals are only ever built through constructors
//! that uphold this ordering, so that a negative duration can never be
//! observed downstream.
//!
//! ```
//! use frame_reporter::interval::TimeInterval;
//!
//! let a = TimeInterval::checked(10, 25).unwrap(); // constructs [10, 25].
//! assert_eq!(a.duration(), 15);
//!
//! // Reversed bounds are rejected rather than clamped.
//! assert!(TimeInterval::checked(25, 10).is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::clock::{Duration, Timestamp};

/// A closed time interval.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct TimeInterval {
    start: Timestamp,
    end: Timestamp,
}

impl TimeInterval {
    /// Builds `[start, end]` if `start <= end`.
    pub fn checked(start: Timestamp, end: Timestamp) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Builds `[start, end]` if both bounds are known and ordered.
    ///
    /// ```
    /// use frame_reporter::interval::TimeInterval;
    ///
    /// assert!(TimeInterval::between(Some(1), None).is_none());
    /// assert_eq!(TimeInterval::between(Some(1), Some(3)).map(|i| i.duration()), Some(2));
    /// ```
    pub fn between(start: Option<Timestamp>, end: Option<Timestamp>) -> Option<Self> {
        Self::checked(start?, end?)
    }

    /// Builds `[start, max(start, end)]`.
    pub fn clamped(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true if the interval has zero length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Builds the smallest interval covering `self` and `other`.
    ///
    /// ```
    /// use frame_reporter::interval::TimeInterval;
    ///
    /// let a = TimeInterval::checked(0, 1).unwrap();
    /// let b = TimeInterval::checked(2, 3).unwrap();
    ///
    /// assert_eq!(a.extent(&b), TimeInterval::checked(0, 3).unwrap());
    /// ```
    pub fn extent(&self, other: &TimeInterval) -> TimeInterval {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns true if `value` lies in `self`.
    ///
    /// ```
    /// use frame_reporter::interval::TimeInterval;
    ///
    /// let a = TimeInterval::checked(0, 2).unwrap();
    ///
    /// assert_eq!(a.contains(0), true);
    /// assert_eq!(a.contains(2), true);
    /// assert_eq!(a.contains(3), false);
    /// ```
    pub fn contains(&self, value: Timestamp) -> bool {
        self.start <= value && value <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::TimeInterval;

    #[test]
    fn test_clamped() {
        let i = TimeInterval::clamped(10, 4);

        assert_eq!(i.start(), 10);
        assert_eq!(i.end(), 10);
        assert!(i.is_empty());
    }

    #[test]
    fn test_zero_length_is_valid() {
        let i = TimeInterval::checked(7, 7).unwrap();

        assert_eq!(i.duration(), 0);
        assert!(i.contains(7));
    }
}
