//! Time utilities for the simulation clock

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Upper bound on a single tick's delta time (seconds)
pub const MAX_TICK_DELTA: f32 = 1.0 / 30.0;

/// Default host tick rate
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Sanitize a measured frame delta: NaN, infinite and negative values become 0,
/// everything else is capped at [`MAX_TICK_DELTA`].
pub fn clamp_delta(dt: f32) -> f32 {
    if !dt.is_finite() || dt < 0.0 {
        warn!(dt, "Discarding invalid tick delta");
        return 0.0;
    }
    dt.min(MAX_TICK_DELTA)
}

/// Monotonic simulation clock in whole milliseconds.
///
/// Advanced only by the tick, so every timed effect is reproducible in tests.
/// Sub-millisecond remainders carry over to the next advance.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ms: u64,
    carry: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advance by `dt` seconds, returning the new time
    pub fn advance(&mut self, dt: f32) -> u64 {
        let total = self.carry + f64::from(dt) * 1000.0;
        let whole = total.floor();
        self.carry = total - whole;
        self.now_ms += whole as u64;
        self.now_ms
    }

    /// Advance by an exact number of milliseconds
    pub fn advance_ms(&mut self, ms: u64) -> u64 {
        self.now_ms += ms;
        self.now_ms
    }
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs_f32(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_delta_rejects_garbage() {
        assert_eq!(clamp_delta(f32::NAN), 0.0);
        assert_eq!(clamp_delta(f32::INFINITY), 0.0);
        assert_eq!(clamp_delta(-0.5), 0.0);
        assert_eq!(clamp_delta(0.5), MAX_TICK_DELTA);
        assert_eq!(clamp_delta(0.01), 0.01);
    }

    #[test]
    fn sim_clock_carries_fractions() {
        let mut clock = SimClock::new();
        // 60 Hz frames are 16.67 ms; three of them make 50 ms
        for _ in 0..3 {
            clock.advance(1.0 / 60.0);
        }
        assert!(clock.now_ms() == 49 || clock.now_ms() == 50);
        clock.advance_ms(50);
        assert!(clock.now_ms() >= 99);
    }
}
