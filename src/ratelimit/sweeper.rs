//! Background eviction of idle caller keys.
//!
//! The admission check itself never evicts, so registry memory tracks the
//! number of distinct keys ever seen. Running this task bounds that
//! growth without changing decisions for active keys: a swept key is
//! recreated lazily on its next check.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::clock::Clock;

use super::limiter::RateLimiter;

/// Periodically sweep idle keys from the limiter.
///
/// Runs until the owning task is dropped or aborted. `every` must be
/// non-zero.
pub async fn run<C: Clock>(limiter: Arc<RateLimiter<C>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let evicted = limiter.sweep_stale();
        if evicted > 0 {
            debug!(evicted = evicted, "Evicted idle rate limit keys");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_run_evicts_idle_keys_on_interval() {
        tokio_test::block_on(async {
            tokio::time::pause();

            let clock = ManualClock::new(0);
            let limiter = Arc::new(RateLimiter::with_clock(clock.clone()));
            limiter
                .check_rate_limit("idle", 3, Duration::from_millis(1_000))
                .unwrap();
            assert_eq!(limiter.key_count(), 1);

            let task = tokio::spawn(run(Arc::clone(&limiter), Duration::from_secs(30)));

            // Leave the key idle well past its window, then let the
            // sweeper tick.
            clock.set(60_000);
            tokio::time::sleep(Duration::from_secs(31)).await;

            assert_eq!(limiter.key_count(), 0);
            task.abort();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_leaves_active_keys_alone() {
        let clock = ManualClock::new(0);
        let limiter = Arc::new(RateLimiter::with_clock(clock.clone()));

        let task = tokio::spawn(run(Arc::clone(&limiter), Duration::from_secs(30)));

        limiter
            .check_rate_limit("busy", 3, Duration::from_millis(120_000))
            .unwrap();
        clock.set(60_000);
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(limiter.key_count(), 1);
        task.abort();
    }
}
