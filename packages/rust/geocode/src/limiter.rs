//! Rate limiting for provider calls.
//!
//! A sliding-window log: at most `max_calls` grants begin within any rolling
//! `window`, measured on the tokio clock. Grant timestamps are pruned as the
//! window slides, so the cap holds for every window position, not only for
//! aligned buckets.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use geofill_shared::{GeofillError, Result};

/// Gate the enrichment engine awaits before issuing each lookup.
///
/// Swappable so engine tests can run without a clock.
pub trait RateLimit: Send + Sync {
    /// Suspend until the next call may begin. Never fails; at worst delays.
    fn acquire(&self) -> impl Future<Output = ()> + Send;

    /// Take a slot only if one is free right now.
    fn try_acquire(&self) -> bool;
}

/// Sliding-window rate limiter.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// At most `max_calls` grants within any `window`. Both must be non-zero.
    pub fn new(max_calls: u32, window: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(GeofillError::validation("max_calls must be at least 1"));
        }
        if window.is_zero() {
            return Err(GeofillError::validation("rate window must be non-zero"));
        }

        Ok(Self {
            max_calls: max_calls as usize,
            window,
            grants: Mutex::new(VecDeque::new()),
        })
    }

    /// Wait until a slot frees up, then take it. The lock is never held
    /// across the sleep.
    async fn wait_for_slot(&self) {
        loop {
            let wake_at = {
                let mut grants = self.grants.lock().unwrap_or_else(|p| p.into_inner());
                let now = Instant::now();
                Self::prune(&mut grants, now, self.window);

                if grants.len() < self.max_calls {
                    grants.push_back(now);
                    return;
                }

                // The oldest grant leaving the window frees the next slot.
                grants[0] + self.window
            };

            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Drop grants that have slid out of the window ending at `now`.
    fn prune(grants: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = grants.front() {
            if now.duration_since(oldest) >= window {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateLimit for RateLimiter {
    fn acquire(&self) -> impl Future<Output = ()> + Send {
        self.wait_for_slot()
    }

    fn try_acquire(&self) -> bool {
        let mut grants = self.grants.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        Self::prune(&mut grants, now, self.window);

        if grants.len() < self.max_calls {
            grants.push_back(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_settings_are_rejected() {
        assert!(RateLimiter::new(0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(5, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1)).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_call_waits_out_the_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1)).unwrap();
        let start = Instant::now();
        for _ in 0..6 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staggered_grants_free_up_in_order() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(400)).await;
        limiter.acquire().await;

        // Both slots taken; the third grant opens when the first expires.
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        // And the fourth when the 400ms grant expires.
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_holds_for_any_window_position() {
        let limiter = RateLimiter::new(3, Duration::from_millis(300)).unwrap();
        let mut grant_times = Vec::new();
        for _ in 0..10 {
            limiter.acquire().await;
            grant_times.push(Instant::now());
        }

        // With a cap of 3, each grant must trail the one three before it
        // by at least a full window.
        for pair in grant_times.windows(4) {
            assert!(pair[3].duration_since(pair[0]) >= Duration::from_millis(300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_reports_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
    }
}
