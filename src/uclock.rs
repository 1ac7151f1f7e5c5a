//! Monotonic/wall clock abstraction, 27 MHz ticks (spec §3, §6).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// The framework's universal time quantum: 27 MHz ticks.
pub const UCLOCK_FREQ: u64 = 27_000_000;

/// An invalid/unset timestamp, matching the source's `UINT64_MAX`
/// sentinel convention.
pub const UCLOCK_INVALID: u64 = u64::MAX;

/// A POSIX seconds+ticks split of a wall-clock value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PosixTime {
    pub seconds: i64,
    /// Sub-second remainder, in 27 MHz ticks.
    pub ticks: u64,
}

/// Abstraction over a clock source.
///
/// Two flavors are expected in practice: a [`MonotonicClock`] for
/// scheduling (timers, pump deadlines) and a [`WallClock`] for
/// timestamping media against real-world time. Both report in 27 MHz
/// units.
pub trait Uclock: Send + Sync {
    /// Current time in 27 MHz ticks since an arbitrary (monotonic) or
    /// UNIX-epoch (wall) origin.
    fn now(&self) -> u64;
}

/// Monotonic clock backed by [`std::time::Instant`], suitable for
/// scheduling and duration measurement but not for real timestamps.
pub struct MonotonicClock {
    origin: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: std::time::Instant::now(),
        }
    }
}

impl Uclock for MonotonicClock {
    fn now(&self) -> u64 {
        let elapsed = self.origin.elapsed();
        elapsed.as_secs() * UCLOCK_FREQ
            + (elapsed.subsec_nanos() as u64 * UCLOCK_FREQ) / 1_000_000_000
    }
}

/// Wall clock backed by the system real-time clock, convertible to a
/// POSIX seconds+ticks split.
#[derive(Default)]
pub struct WallClock;

impl WallClock {
    pub fn new() -> Self {
        WallClock
    }

    /// Convert a 27 MHz tick value (as returned by `now()`, i.e.
    /// ticks since the UNIX epoch) into a POSIX seconds+ticks split.
    pub fn to_posix(ticks_since_epoch: u64) -> PosixTime {
        PosixTime {
            seconds: (ticks_since_epoch / UCLOCK_FREQ) as i64,
            ticks: ticks_since_epoch % UCLOCK_FREQ,
        }
    }
}

impl Uclock for WallClock {
    fn now(&self) -> u64 {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        d.as_secs() * UCLOCK_FREQ + (d.subsec_nanos() as u64 * UCLOCK_FREQ) / 1_000_000_000
    }
}

/// A settable clock for tests: lets scenarios drive exact `(cr_sys,
/// cr_prog)` sequences without wall-clock jitter (used by the
/// dejitter probe's test suite).
pub struct TestClock {
    ticks: AtomicI64,
}

impl TestClock {
    pub fn new(start: u64) -> Self {
        TestClock {
            ticks: AtomicI64::new(start as i64),
        }
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks as i64, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.ticks.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Uclock for TestClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst) as u64
    }
}
