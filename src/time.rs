//! Normalized timestamps for the virtual timeline.
//!
//! A [`TimeValue`] is a signed whole-seconds component plus a signed
//! nanoseconds component in the open range (-1e9, 1e9). Every constructor
//! and arithmetic operation renormalizes the pair so that the nanoseconds
//! sign agrees with the seconds sign (or the seconds are zero). With that
//! invariant, ordering is plain lexicographic comparison of
//! `(secs, nanos)`, which is exactly what the derived `Ord` does.
//!
//! # Example
//!
//! ```
//! use firmbus::TimeValue;
//!
//! let t = TimeValue::from_millis(1500);
//! assert_eq!(t.secs(), 1);
//! assert_eq!(t.subsec_nanos(), 500_000_000);
//!
//! // Subtraction renormalizes: 1.2s - 2.5s = -1.3s
//! let d = TimeValue::from_millis(1200) - TimeValue::from_millis(2500);
//! assert_eq!(d.secs(), -1);
//! assert_eq!(d.subsec_nanos(), -300_000_000);
//! assert!(d < TimeValue::ZERO);
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A signed, normalized seconds + nanoseconds timestamp.
///
/// Field order matters: the derived `PartialOrd`/`Ord` compare `secs`
/// first, then `nanos`, which is correct only because both components are
/// kept sign-agreeing by [`TimeValue::new`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeValue {
    secs: i64,
    nanos: i32,
}

impl TimeValue {
    /// The zero timestamp.
    pub const ZERO: TimeValue = TimeValue { secs: 0, nanos: 0 };

    /// Creates a timestamp from arbitrary seconds and nanoseconds,
    /// normalizing the pair.
    ///
    /// The nanoseconds argument may be any magnitude or sign; whole seconds
    /// are carried into `secs` and the remainder's sign is reconciled with
    /// the result's seconds.
    ///
    /// # Example
    ///
    /// ```
    /// use firmbus::TimeValue;
    ///
    /// // 1s + 2.5e9 ns carries into 3.5s
    /// let t = TimeValue::new(1, 2_500_000_000);
    /// assert_eq!((t.secs(), t.subsec_nanos()), (3, 500_000_000));
    ///
    /// // Mixed signs reconcile: 2s - 0.5s
    /// let t = TimeValue::new(2, -500_000_000);
    /// assert_eq!((t.secs(), t.subsec_nanos()), (1, 500_000_000));
    /// ```
    pub fn new(secs: i64, nanos: i64) -> Self {
        let mut secs = secs + nanos / NANOS_PER_SEC;
        let mut nanos = nanos % NANOS_PER_SEC;

        if secs > 0 && nanos < 0 {
            secs -= 1;
            nanos += NANOS_PER_SEC;
        } else if secs < 0 && nanos > 0 {
            secs += 1;
            nanos -= NANOS_PER_SEC;
        }

        TimeValue {
            secs,
            nanos: nanos as i32,
        }
    }

    /// Creates a timestamp of whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        TimeValue { secs, nanos: 0 }
    }

    /// Creates a timestamp from milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self::new(millis / 1_000, (millis % 1_000) * 1_000_000)
    }

    /// Creates a timestamp from microseconds.
    pub fn from_micros(micros: i64) -> Self {
        Self::new(micros / 1_000_000, (micros % 1_000_000) * 1_000)
    }

    /// Creates a timestamp from nanoseconds.
    pub fn from_nanos(nanos: i64) -> Self {
        Self::new(0, nanos)
    }

    /// Returns the whole-seconds component.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Returns the sub-second nanoseconds component in (-1e9, 1e9),
    /// sign-agreeing with [`secs`](Self::secs).
    pub fn subsec_nanos(&self) -> i32 {
        self.nanos
    }

    /// Returns the total value in nanoseconds.
    pub fn as_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }

    /// Returns the value as floating-point seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nanos as f64 / NANOS_PER_SEC as f64
    }

    /// Returns true if this is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nanos == 0
    }

    /// Returns true if this is strictly after zero.
    pub fn is_positive(&self) -> bool {
        *self > TimeValue::ZERO
    }

    /// Returns true if this is strictly before zero.
    pub fn is_negative(&self) -> bool {
        *self < TimeValue::ZERO
    }
}

impl Add for TimeValue {
    type Output = TimeValue;

    fn add(self, rhs: TimeValue) -> TimeValue {
        TimeValue::new(self.secs + rhs.secs, self.nanos as i64 + rhs.nanos as i64)
    }
}

impl Sub for TimeValue {
    type Output = TimeValue;

    fn sub(self, rhs: TimeValue) -> TimeValue {
        TimeValue::new(self.secs - rhs.secs, self.nanos as i64 - rhs.nanos as i64)
    }
}

impl Neg for TimeValue {
    type Output = TimeValue;

    fn neg(self) -> TimeValue {
        TimeValue::new(-self.secs, -(self.nanos as i64))
    }
}

impl AddAssign for TimeValue {
    fn add_assign(&mut self, rhs: TimeValue) {
        *self = *self + rhs;
    }
}

impl SubAssign for TimeValue {
    fn sub_assign(&mut self, rhs: TimeValue) {
        *self = *self - rhs;
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.as_nanos();
        let sign = if total < 0 { "-" } else { "" };
        let magnitude = total.unsigned_abs();
        let secs = magnitude / NANOS_PER_SEC as u128;
        let nanos = magnitude % NANOS_PER_SEC as u128;
        write!(f, "{}{}.{:09}s", sign, secs, nanos)
    }
}
