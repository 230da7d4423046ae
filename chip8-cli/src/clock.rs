//! Wall-clock pacing.
use std::{
    thread,
    time::{Duration, Instant},
};

/// Timer to synchronize the driving thread with the software clock
/// of the virtual CPU, and with the 60Hz timer cadence.
///
/// It is designed to work with the yielding cooperative pattern of
/// the interpreter loop. When the VM yields control back to the
/// caller, time elapses until it is resumed. Once the interpreter
/// is resumed, the elapsed time is taken into account when
/// determining the next cycle.
pub struct Clock {
    interval: Duration,
    start: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            start: Instant::now(),
        }
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.start = Instant::now()
    }

    /// Check whether a full cycle has elapsed, and start the next
    /// cycle if it has.
    pub fn tick(&mut self) -> bool {
        if self.start.elapsed() >= self.interval {
            // Reset back to zero, rather than trying to catch up.
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        loop {
            if self.start.elapsed() < self.interval {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Spinning a loop causes high CPU usage and fan madness.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                self.reset();
                return;
            }
        }
    }
}
