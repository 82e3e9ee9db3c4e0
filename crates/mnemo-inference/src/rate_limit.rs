//! Minimum-interval rate limiting for outbound provider calls.
//!
//! A [`RateLimiter`] is an explicit object shared through `Arc`. One limiter
//! per process gives a global limit; injecting one per tenant partitions it.
//! Waiting is a deliberate delay and never an error.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a fixed minimum interval between successive calls.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter with an explicit minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// Limiter allowing `requests_per_minute` calls (`60s / rpm` apart).
    ///
    /// Zero means unlimited.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / requests_per_minute
        };
        Self::new(interval)
    }

    /// Limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the minimum interval has elapsed since the previous call,
    /// then record this call.
    ///
    /// The lock is held across the sleep so concurrent callers queue behind
    /// one clock instead of all waking at the same instant.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                debug!(
                    subsystem = "inference",
                    component = "rate_limiter",
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit wait"
                );
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_minute(mnemo_core::defaults::EMBED_REQUESTS_PER_MINUTE)
    }
}
