/*! Time structures.

The fast path exchanges timestamps through shared memory as wrapping 32-bit microsecond counters
(the last activity of a context, the timestamp to echo in the next segment). The [Instant] type
here is the wide representation these are derived from.

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represet relative time.

[Instant]: struct.Instant.html
[Duration]: struct.Duration.html
*/
use core::{fmt, ops};
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of
/// microseconds, monotonically increasing since an arbitrary moment in time, such as system
/// startup.
///
/// * A value of `0` is inherently arbitrary.
/// * A value less than `0` indicates a time before the starting point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    /// Microseconds since the arbitrary starting point.
    pub micros: i64,
}

impl Instant {
    /// Create a new `Instant` from a number of microseconds.
    pub fn from_micros<T: Into<i64>>(micros: T) -> Instant {
        Instant { micros: micros.into() }
    }

    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { micros: millis.into() * 1000 }
    }

    /// Create a new `Instant` from the current [std::time::SystemTime].
    ///
    /// [std::time::SystemTime]: https://doc.rust-lang.org/std/time/struct.SystemTime.html
    #[cfg(feature = "std")]
    pub fn now() -> Instant {
        Self::from(::std::time::SystemTime::now())
    }

    /// The total number of microseconds that have passed since the beginning of time.
    pub fn total_micros(&self) -> i64 {
        self.micros
    }

    /// The total number of milliseconds that have passed since the beginning of time.
    pub fn total_millis(&self) -> i64 {
        self.micros / 1000
    }

    /// The truncated 32-bit timestamp as stored in shared memory registers.
    pub fn timestamp(&self) -> u32 {
        self.micros as u32
    }

    /// Microseconds elapsed from an earlier 32-bit register timestamp, wrapping correctly.
    pub fn since_timestamp(&self, earlier: u32) -> u32 {
        self.timestamp().wrapping_sub(earlier)
    }
}

#[cfg(feature = "std")]
impl From<::std::time::SystemTime> for Instant {
    fn from(other: ::std::time::SystemTime) -> Instant {
        let n = other.duration_since(::std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_micros(n.as_secs() as i64 * 1_000_000 + i64::from(n.subsec_micros()))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:06}s", self.micros / 1_000_000, self.micros % 1_000_000)
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_micros(self.micros + rhs.as_micros() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.micros += rhs.as_micros() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_micros(self.micros - rhs.as_micros() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_micros((self.micros - rhs.micros).max(0) as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timestamps_wrap() {
        let early = Instant::from_micros(u32::max_value() as i64 - 5);
        let late = early + Duration::from_micros(10);
        assert_eq!(late.since_timestamp(early.timestamp()), 10);
        assert_eq!(late - early, Duration::from_micros(10));
    }

    #[test]
    fn display() {
        assert_eq!(Instant::from_millis(1500).to_string(), "1.500000s");
    }
}
