//! Per-key retry accounting for failed delta batches.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::rate_limit::ApiRateLimiter;

/// Handler invocations allowed per key before its batch is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Requeues per second allowed across all keys.
const RETRY_RATE_PER_SECOND: u32 = 1;
const RETRY_BURST: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue; `attempt` handler calls have failed so far.
    Retry { attempt: u32 },
    /// Drop the batch after `attempts` failed calls.
    GiveUp { attempts: u32 },
}

/// Counts consecutive failures per key and paces requeues with a token
/// bucket.
pub struct RetryManager {
    max_attempts: u32,
    failures: Mutex<HashMap<String, u32>>,
    limiter: ApiRateLimiter,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryManager {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            failures: Mutex::new(HashMap::new()),
            limiter: ApiRateLimiter::with_burst(RETRY_RATE_PER_SECOND, RETRY_BURST),
        }
    }

    /// Record a failed attempt for `key` and decide whether to retry it.
    ///
    /// Giving up forgets the key, so a later failure starts a new streak.
    pub fn record_failure(&self, key: &str) -> RetryDecision {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(key.to_string()).or_insert(0);
        *count += 1;
        let attempts = *count;
        if attempts < self.max_attempts {
            RetryDecision::Retry { attempt: attempts }
        } else {
            failures.remove(key);
            RetryDecision::GiveUp { attempts }
        }
    }

    /// Reset the failure streak of `key`.
    pub fn forget(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Wait for a requeue token.
    pub async fn wait(&self) {
        self.limiter.wait().await;
    }
}
