//! Time sources for the admission check.
//!
//! The limiter's window arithmetic runs entirely on millisecond instants
//! supplied by a [`Clock`], so tests drive time by hand instead of
//! sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A source of the current instant, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// The current instant in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A manually driven clock for tests.
///
/// Cloning shares the underlying instant, so a test can hold one handle
/// while the limiter under test holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the given instant.
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Set the current instant.
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);

        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);

        clock.set(10_000);
        assert_eq!(clock.now_millis(), 10_000);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();

        handle.advance(250);
        assert_eq!(clock.now_millis(), 250);
    }

    #[test]
    fn test_system_clock_is_past_2020() {
        // 2020-01-01T00:00:00Z in milliseconds
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
