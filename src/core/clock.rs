use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

/// Monotonic millisecond time source. `0` is reserved for "never".
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction, offset by one so a reading is never `0`.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64 + 1
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::Release);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_never_zero() {
        let clock = MonotonicClock::new();
        let first = clock.now_ms();
        assert!(first >= 1);
        assert!(clock.now_ms() >= first);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::starting_at(1_000);
        clock.advance(2_500);
        assert_eq!(clock.now_ms(), 3_500);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }
}
