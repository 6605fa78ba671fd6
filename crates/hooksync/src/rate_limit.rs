//! Token-bucket limiter built on governor.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A shared, unkeyed rate limiter.
///
/// ```ignore
/// use hooksync::rate_limit::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::with_burst(1, 10);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// `requests_per_second` steady rate with a burst of the same size.
    /// Zero is treated as one.
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_burst(requests_per_second, requests_per_second)
    }

    /// `requests_per_second` steady rate, up to `burst` requests at once.
    /// Zero values are treated as one.
    pub fn with_burst(requests_per_second: u32, burst: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);
        Self {
            inner: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until a request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}
