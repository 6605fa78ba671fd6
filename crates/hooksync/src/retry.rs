//! Back-off settings for reconnecting to the OpenShift API.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// First reconnect delay.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Longest reconnect delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<usize>,
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: INITIAL_BACKOFF,
            max_delay: MAX_BACKOFF,
            max_retries: None,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: Option<usize>) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries.unwrap_or(usize::MAX));

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Exponential back-off with jitter, 1s to 60s, unbounded attempts.
#[must_use]
pub fn reconnect_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}

/// Resettable sequence of delays.
pub struct Backoff {
    builder: ExponentialBuilder,
    current: ExponentialBackoff,
    max_delay: Duration,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        let max_delay = config.max_delay;
        let builder = config.into_backoff();
        Self {
            current: builder.clone().build(),
            builder,
            max_delay,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.current.next().unwrap_or(self.max_delay)
    }

    /// Start over from the shortest delay.
    pub fn reset(&mut self) {
        self.current = self.builder.clone().build();
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
