//! Process-local cache with per-entry expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

/// How long a listed remote hook is trusted before GitHub is asked again.
pub const REMOTE_HOOK_TTL: Duration = Duration::from_secs(2 * 60);

/// String-keyed cache whose entries expire `ttl` after insertion.
///
/// Entries are never updated in place; inserting over an existing key
/// replaces the value and restarts its clock.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Instant, V)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.lock().insert(key.into(), (Instant::now(), value));
    }

    /// Live value for `key`. Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|(_, value)| value)
    }

    /// Keys of live entries, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut entries = self.lock();
        entries.retain(|_, (inserted, _)| inserted.elapsed() < self.ttl);
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
