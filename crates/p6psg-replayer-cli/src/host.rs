//! Host-side tick scheduling: the 2 ms cadence with drift correction.
//!
//! The driver is told nothing about wall-clock time; this module decides
//! how many 2 ms ticks are due at each wakeup and caps catch-up so an
//! overloaded system cannot spiral.

use std::time::{Duration, Instant};

/// Host tick period required by the driver contract.
pub const TICK_PERIOD: Duration = Duration::from_millis(2);

/// Upper bound on back-to-back catch-up ticks after a late wakeup.
pub const MAX_CATCH_UP_TICKS: u32 = 50;

/// Deadline-based tick scheduler.
///
/// Sleeps are expected to be coarse; the deadline arithmetic keeps the
/// long-run rate exact even when every wakeup is late.
pub struct TickScheduler {
    next_deadline: Instant,
}

impl TickScheduler {
    /// Scheduler whose first tick is due one period from `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            next_deadline: now + TICK_PERIOD,
        }
    }

    /// How many ticks are due at `now`, advancing the deadline by that
    /// many periods. Returns 0 on an early wakeup.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        if now < self.next_deadline {
            return 0;
        }
        let behind = now.duration_since(self.next_deadline);
        let due = ((behind.as_micros() / TICK_PERIOD.as_micros()) as u32 + 1)
            .min(MAX_CATCH_UP_TICKS);
        self.next_deadline += TICK_PERIOD * due;
        due
    }

    /// Instant the next tick is due; sleep until roughly here.
    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Drop accumulated lateness, e.g. when resuming from pause.
    pub fn resync(&mut self, now: Instant) {
        self.next_deadline = now + TICK_PERIOD;
    }
}
