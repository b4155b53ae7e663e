//! Core rate limiter implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::error::{FloodgateError, Result};

use super::bucket::Bucket;
use super::rules::RateLimitRule;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Quota left in the current window after this request.
    pub remaining: u32,
    /// Whole seconds until a retry can succeed; always 0 when admitted.
    pub retry_after_secs: u64,
}

/// The core rate limiter that manages per-key request histories.
///
/// One instance is constructed at process start and shared by handle
/// across request handlers. The whole check-and-update sequence for a
/// key runs under a single registry lock, so concurrent checks for the
/// same key can never admit more than the configured limit.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Request histories indexed by caller key
    buckets: Mutex<HashMap<String, Bucket>>,
    /// Time source for window arithmetic
    clock: C,
    /// Largest window any check has enforced; drives stale-key sweeping
    max_window_millis: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a new rate limiter on the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
            max_window_millis: AtomicU64::new(0),
        }
    }

    /// Check whether a request from `key` is admitted under `limit`
    /// requests per sliding `window`.
    ///
    /// Timestamps older than the window are pruned, the retained count is
    /// compared against the limit, and on admission the current instant is
    /// recorded. Denied requests consume no quota. Distinct keys are
    /// tracked fully independently.
    ///
    /// Returns an error when `key` is empty, `limit` is zero, or `window`
    /// is zero; those are caller contract violations, never a decision.
    pub fn check_rate_limit(&self, key: &str, limit: u32, window: Duration) -> Result<Decision> {
        if key.is_empty() {
            return Err(FloodgateError::InvalidConfiguration(
                "caller key must not be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(FloodgateError::InvalidConfiguration(
                "limit must be positive".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(FloodgateError::InvalidConfiguration(
                "window must be positive".to_string(),
            ));
        }
        let window_millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);

        let now = self.clock.now_millis();
        let cutoff = now.saturating_sub(window_millis);
        self.max_window_millis
            .fetch_max(window_millis, Ordering::Relaxed);

        trace!(key = %key, limit = limit, window_millis = window_millis, "Checking rate limit");

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| {
            debug!(key = %key, "Creating new rate limit bucket");
            Bucket::new()
        });

        bucket.prune(cutoff);

        if bucket.len() >= limit as usize {
            // Retry once the oldest retained timestamp exits the window.
            let oldest = bucket.oldest().unwrap_or(now);
            let wait_millis = (oldest + window_millis).saturating_sub(now);
            let retry_after_secs = wait_millis.div_ceil(1_000).max(1);

            debug!(key = %key, retry_after_secs = retry_after_secs, "Rate limit exceeded");

            return Ok(Decision {
                allowed: false,
                remaining: 0,
                retry_after_secs,
            });
        }

        bucket.record(now);
        let remaining = (limit as usize).saturating_sub(bucket.len()) as u32;

        Ok(Decision {
            allowed: true,
            remaining,
            retry_after_secs: 0,
        })
    }

    /// Check a request against a configured rule.
    pub fn check_rule(&self, key: &str, rule: &RateLimitRule) -> Result<Decision> {
        self.check_rate_limit(key, rule.limit, rule.window())
    }

    /// Drop every key whose newest timestamp has aged out of the largest
    /// window this limiter has enforced. Returns the number of evicted
    /// keys.
    ///
    /// A key evicted here is recreated lazily on its next check, so
    /// eviction is invisible to callers; it only bounds memory held for
    /// idle keys.
    pub fn sweep_stale(&self) -> usize {
        let horizon = self.max_window_millis.load(Ordering::Relaxed);
        if horizon == 0 {
            return 0;
        }
        let cutoff = self.clock.now_millis().saturating_sub(horizon);

        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.newest().is_some_and(|newest| newest >= cutoff));
        before - buckets.len()
    }

    /// Get the number of live buckets.
    pub fn key_count(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Drop all buckets.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }
}
