//! Virtual clock for discrete-event simulation.
//!
//! The [`SimClock`] tracks simulated time in seconds, advancing only when the
//! run loop processes an event, so runs are deterministic regardless of host
//! speed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulation time in seconds.
    now: f64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Current time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advance the clock to an absolute time in seconds.
    ///
    /// # Panics
    ///
    /// Panics if `time` is in the past or not finite.
    pub fn advance_to(&mut self, time: f64) {
        assert!(time.is_finite(), "Cannot move clock to {}", time);
        assert!(
            time >= self.now,
            "Cannot move clock backwards: current={}s, target={}s",
            self.now,
            time,
        );
        self.now = time;
    }

    /// Advance the clock by a duration in seconds.
    pub fn advance_by(&mut self, delta: f64) {
        self.advance_to(self.now + delta);
    }
}
