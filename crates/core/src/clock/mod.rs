use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

/// Source of engine time in seconds. Locks, blink scheduling and breathing
/// all read the same clock so commands and ticks agree on "now".
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> f64;
}

/// Wall clock measured from the moment the engine was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Externally driven clock with microsecond resolution, used for
/// deterministic playback and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(seconds: f64) -> Self {
        let clock = Self::new();
        clock.set(seconds);
        clock
    }

    pub fn set(&self, seconds: f64) {
        self.micros.store(to_micros(seconds), Ordering::SeqCst);
    }

    pub fn advance(&self, delta: f64) {
        self.micros.fetch_add(to_micros(delta), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}

fn to_micros(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1_000_000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_never_goes_negative() {
        let clock = ManualClock::at(1.5);
        clock.advance(0.25);
        assert_eq!(clock.now(), 1.75);

        clock.set(-3.0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock::start();
        let first = clock.now();
        assert!(first >= 0.0);
        assert!(clock.now() >= first);
    }
}
