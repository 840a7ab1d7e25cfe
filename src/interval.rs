//! Half-open value ranges
//!
//! `Interval<T>` is the unit of exclusion, query and mapping results. It is
//! instantiated with `i64` for both byte offsets and milliseconds.

use std::fmt;

use num_traits::Num;
use serde::{Deserialize, Serialize};

/// A `[start, end)` range over an ordered numeric type.
///
/// Intervals with `end <= start` are valid values; they simply cover nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T> Interval<T>
where
    T: Num + Copy + PartialOrd,
{
    pub fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    /// `end - start`, which is negative for inverted intervals.
    pub fn length(&self) -> T {
        self.end - self.start
    }

    /// Length for sizing purposes: never below zero.
    pub fn clamped_length(&self) -> T {
        if self.end > self.start {
            self.end - self.start
        } else {
            T::zero()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, point: T) -> bool {
        self.start <= point && point < self.end
    }

    /// Smallest interval covering both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        let start = if other.start < self.start {
            other.start
        } else {
            self.start
        };
        let end = if other.end > self.end {
            other.end
        } else {
            self.end
        };
        Self { start, end }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// Overlapping part of both intervals, if it is non-empty.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = if other.start > self.start {
            other.start
        } else {
            self.start
        };
        let end = if other.end < self.end {
            other.end
        } else {
            self.end
        };
        (start < end).then_some(Self { start, end })
    }

    /// Copy of `self` with both ends limited to `[min, max]`.
    pub fn clipped(&self, min: T, max: T) -> Self {
        let clamp = |v: T| {
            if v < min {
                min
            } else if v > max {
                max
            } else {
                v
            }
        };
        Self {
            start: clamp(self.start),
            end: clamp(self.end),
        }
    }
}

impl<T> From<(T, T)> for Interval<T> {
    fn from((start, end): (T, T)) -> Self {
        Self { start, end }
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
