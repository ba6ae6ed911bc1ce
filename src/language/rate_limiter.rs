//! Request pacing for the language API quota.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces requests evenly so no more than `limit` start in any minute.
///
/// Callers queue on the next free slot; a slot is one `60s / limit`
/// interval after the previous one.
#[derive(Debug)]
pub struct RequestRateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RequestRateLimiter {
    /// Create a limiter allowing `limit` requests per minute.
    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self {
            interval: Duration::from_secs(60) / limit.max(1),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait until this caller's slot comes up.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        sleep_until(slot).await;
    }

    /// Time between consecutive slots.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_limit() {
        assert_eq!(
            RequestRateLimiter::per_minute(600).interval(),
            Duration::from_millis(100)
        );
        assert_eq!(RequestRateLimiter::per_minute(0).interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_spaces_requests() {
        let limiter = RequestRateLimiter::per_minute(600);
        let start = Instant::now();

        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_is_not_banked() {
        let limiter = RequestRateLimiter::per_minute(60);
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(10)).await;

        // After a long idle period only one immediate slot is available
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
