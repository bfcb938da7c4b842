use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::time::Duration;

/// Enforces a minimum spacing between calls made by one caller.
///
/// A zero interval disables spacing.
pub struct CallSpacing {
    limiter: Option<DefaultDirectRateLimiter>,
    interval: Duration,
}

impl CallSpacing {
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(RateLimiter::direct);
        Self { limiter, interval }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call is allowed.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for CallSpacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSpacing")
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_spacing_delays_second_call() {
        let spacing = CallSpacing::from_millis(100);
        let start = Instant::now();
        spacing.acquire().await;
        spacing.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_wait() {
        let spacing = CallSpacing::from_millis(0);
        let start = Instant::now();
        for _ in 0..10 {
            spacing.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
