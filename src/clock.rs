// Time source for the motion stepper
//
// The chain samples `now()` once per step and calls `wait()` between steps.
// `SystemClock` runs in real time; `ManualClock` advances a fixed amount per
// wait so playback is deterministic (simulation and tests).

use std::time::{Duration, Instant};

pub trait Clock: Send {
    /// Monotonic time since the clock was created
    fn now(&self) -> Duration;

    /// Pause until the next step
    fn wait(&mut self, tick: Duration);
}

/// Wall clock, sleeps the calling thread between steps
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wait(&mut self, tick: Duration) {
        std::thread::sleep(tick);
    }
}

/// Simulated clock, every wait advances time by the requested tick
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn wait(&mut self, tick: Duration) {
        self.advance(tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_on_wait() {
        let mut clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.wait(Duration::from_millis(5));
        clock.wait(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(10));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let a = clock.now();
        clock.wait(Duration::from_millis(1));
        assert!(clock.now() > a);
    }
}
