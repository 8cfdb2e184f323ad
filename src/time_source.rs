//! Wall-clock providers consulted by the seek rate limiter.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// A monotonic source of elapsed wall-clock time.
pub trait TimeSource {
    /// Returns the time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Real monotonic time measured from the moment of construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A time source that only moves when told to.
///
/// Used by tests and by scripted scenarios, where wall-clock time must
/// advance in lockstep with simulated ticks.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: Cell<Duration>,
}

impl ManualTimeSource {
    /// Creates a source reading `start`.
    pub fn new(start: Duration) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Moves the reading forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get().saturating_add(delta));
    }

    /// Replaces the current reading.
    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
