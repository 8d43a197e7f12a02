//! Coarse wall-clock throttle for the run loop.

use std::thread;
use std::time::{Duration, Instant};

/// Paces the run loop to a target number of steps per second.
///
/// Each step gets an equal share of one second; a step that finishes early
/// sleeps out the rest of its share. Overrunning steps never sleep, so the
/// throttle only ever slows execution down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    step_budget: Duration,
}

impl Throttle {
    /// Creates a throttle for `steps_per_second`; 0 is treated as 1.
    #[must_use]
    pub fn new(steps_per_second: u32) -> Self {
        Self {
            step_budget: Duration::from_secs(1) / steps_per_second.max(1),
        }
    }

    /// Time allotted to a single step.
    #[must_use]
    pub const fn step_budget(&self) -> Duration {
        self.step_budget
    }

    /// Time left in a step's budget after `elapsed`, if any.
    #[must_use]
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.step_budget
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Sleeps out whatever is left of the budget of a step begun at `started`.
    pub fn pace(&self, started: Instant) {
        if let Some(remaining) = self.remaining(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}
