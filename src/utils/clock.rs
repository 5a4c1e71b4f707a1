use rustix::time::{ClockId, Timespec};
use std::{marker::PhantomData, time::Duration};

/// Id for a clock according to unix clockid_t
pub trait ClockSource {
    /// Gets the id of the clock source
    const ID: ClockId;
}

/// Monotonic clock
#[derive(Debug)]
pub struct Monotonic;

impl ClockSource for Monotonic {
    const ID: ClockId = ClockId::Monotonic;
}

/// Defines a clock with a specific kind
#[derive(Debug)]
pub struct Clock<Kind: ClockSource> {
    _kind: PhantomData<Kind>,
}

impl<Kind: ClockSource> Clock<Kind> {
    /// Initialize a new clock
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Clock { _kind: PhantomData }
    }

    /// Returns the current time
    pub fn now(&self) -> Time<Kind> {
        rustix::time::clock_gettime(Kind::ID).into()
    }

    /// Gets the id of the clock
    pub fn id(&self) -> ClockId {
        Kind::ID
    }
}

/// A point in time for a clock with a specific kind
pub struct Time<Kind> {
    tp: Timespec,
    _kind: PhantomData<Kind>,
}

impl Time<Monotonic> {
    /// Returns the time in milliseconds
    ///
    /// Input event timestamps use this representation throughout the crate:
    /// millisecond-granularity CLOCK_MONOTONIC, 64 bits wide so it does not
    /// wrap within the lifetime of a session.
    pub fn as_millis(&self) -> u64 {
        debug_assert!(self.tp.tv_sec >= 0);
        debug_assert!(self.tp.tv_nsec >= 0);
        self.tp.tv_sec as u64 * 1000 + self.tp.tv_nsec as u64 / 1_000_000
    }

    /// Returns the time in microseconds
    pub fn as_micros(&self) -> u64 {
        debug_assert!(self.tp.tv_sec >= 0);
        debug_assert!(self.tp.tv_nsec >= 0);
        self.tp.tv_sec as u64 * 1_000_000 + self.tp.tv_nsec as u64 / 1000
    }
}

impl<Kind> Clone for Time<Kind> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Kind> Copy for Time<Kind> {}

impl<Kind> std::fmt::Debug for Time<Kind> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Time").field("tp", &self.tp).finish()
    }
}

impl<Kind> PartialEq for Time<Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.tp == other.tp
    }
}

impl<Kind> Eq for Time<Kind> {}

impl<Kind> PartialOrd for Time<Kind> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<Kind> Ord for Time<Kind> {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.tp.tv_sec, self.tp.tv_nsec).cmp(&(other.tp.tv_sec, other.tp.tv_nsec))
    }
}

impl<Kind> From<Timespec> for Time<Kind> {
    #[inline]
    fn from(tp: Timespec) -> Self {
        Time {
            tp,
            _kind: PhantomData,
        }
    }
}

impl<Kind: ClockSource> From<Duration> for Time<Kind> {
    #[inline]
    fn from(tp: Duration) -> Self {
        let tp = Timespec {
            tv_sec: tp.as_secs() as rustix::time::Secs,
            tv_nsec: tp.subsec_nanos() as rustix::time::Nsecs,
        };
        Time {
            tp,
            _kind: PhantomData,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn monotonic_millis() {
        let t = Time::<Monotonic>::from(Duration::new(2, 500_000_000));
        assert_eq!(t.as_millis(), 2500);
        assert_eq!(t.as_micros(), 2_500_000);
    }

    #[test]
    fn monotonic_advances() {
        let clock: Clock<Monotonic> = Clock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
