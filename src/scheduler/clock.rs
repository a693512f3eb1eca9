//! Time sources for sample pacing
//!
//! [`MonotonicClock`] waits on the real monotonic clock. [`VirtualClock`]
//! advances an internal offset instead of waiting, for rendering output as
//! fast as possible while keeping the same emission timeline.

use std::time::{Duration, Instant};

/// Remaining time above which [`MonotonicClock`] sleeps instead of spinning
pub const SPIN_THRESHOLD: Duration = Duration::from_micros(200);

/// A monotonic time source that can block until a deadline
pub trait Clock {
    /// Current time
    fn now(&self) -> Instant;

    /// Block until `now() >= deadline`
    fn wait_until(&mut self, deadline: Instant);
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn wait_until(&mut self, deadline: Instant) {
        (**self).wait_until(deadline)
    }
}

/// Wall-clock pacing on [`Instant`]
///
/// Sleeps while the deadline is far away and spins for the last
/// [`SPIN_THRESHOLD`], since thread sleeps overshoot by tens of
/// microseconds and one sample period at 44.1 kHz is 23 µs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Create a monotonic clock
    pub fn new() -> Self {
        MonotonicClock
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait_until(&mut self, deadline: Instant) {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let remaining = deadline - now;
            if remaining > SPIN_THRESHOLD {
                std::thread::sleep(remaining - SPIN_THRESHOLD);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

/// Simulated time that jumps forward instead of waiting
#[derive(Debug, Clone)]
pub struct VirtualClock {
    origin: Instant,
    elapsed: Duration,
}

impl VirtualClock {
    /// Create a virtual clock starting at the current instant
    pub fn new() -> Self {
        VirtualClock {
            origin: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Simulated time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Advance simulated time without waiting on a deadline
    pub fn advance(&mut self, by: Duration) {
        self.elapsed += by;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed
    }

    fn wait_until(&mut self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            self.elapsed += deadline - now;
        }
    }
}
