//! Per-host rate limiting for crawling

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Enforces a minimum interval between requests to the same host
#[derive(Clone)]
pub struct HostRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl HostRateLimiter {
    /// Create a limiter allowing `requests_per_second` per host
    pub fn new(requests_per_second: f64) -> Self {
        let quota = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Quota::with_period(Duration::from_secs_f64(1.0 / requests_per_second))
        } else {
            None
        }
        .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Wait until the next request to `host` is allowed
    pub async fn wait(&self, host: &str) {
        let key = host.to_string();
        if self.limiter.check_key(&key).is_ok() {
            return;
        }
        trace!("Rate limiting requests to {}", host);
        self.limiter.until_key_ready(&key).await;
    }
}
