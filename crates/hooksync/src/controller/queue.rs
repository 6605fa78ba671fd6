//! Keyed FIFO of deltas.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use super::{DELTA_LOG_TARGET, Delta, DeltaObject, DeltaType, Deltas, KnownHooks};
use crate::openshift::BuildConfig;

#[derive(Default)]
struct FifoState {
    items: HashMap<String, Vec<Delta>>,
    queue: VecDeque<String>,
    closed: bool,
}

impl FifoState {
    fn push(&mut self, delta: Delta) {
        let key = delta.object.key();
        let deltas = self.items.entry(key.clone()).or_default();
        if deltas.is_empty() {
            self.queue.push_back(key);
        }

        if delta.delta_type == DeltaType::Deleted
            && let Some(last) = deltas.last_mut()
            && last.delta_type == DeltaType::Deleted
        {
            // keep the richer of two consecutive deletions
            if matches!(last.object, DeltaObject::Tombstone { .. })
                && matches!(delta.object, DeltaObject::BuildConfig(_))
            {
                *last = delta;
            }
            return;
        }
        deltas.push(delta);
    }
}

/// Accumulates deltas per `namespace/name` key and hands them out one key at
/// a time, in the order keys were first queued.
///
/// There is a single consumer. A key is in the queue at most once; deltas
/// arriving for a queued key are appended to its batch.
pub struct DeltaFifo {
    state: Mutex<FifoState>,
    notify: Notify,
    known: Option<Arc<dyn KnownHooks>>,
}

impl DeltaFifo {
    pub fn new(known: Option<Arc<dyn KnownHooks>>) -> Self {
        Self {
            state: Mutex::new(FifoState::default()),
            notify: Notify::new(),
            known,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FifoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, delta_type: DeltaType, bc: BuildConfig) {
        self.lock()
            .push(Delta::new(delta_type, DeltaObject::BuildConfig(bc)));
        self.notify.notify_one();
    }

    /// Queue a `Sync` delta for every item, then a tombstone for every known
    /// key missing from `items`.
    ///
    /// A tombstone for a queued key goes after its pending deltas. If the
    /// known keys cannot be listed, no tombstones are produced for this round.
    pub async fn replace(&self, items: Vec<BuildConfig>) {
        let listed: HashSet<String> = items.iter().map(BuildConfig::key).collect();
        let tombstones = match &self.known {
            Some(known) => missing_known_hooks(known.as_ref(), &listed).await,
            None => Vec::new(),
        };

        let mut state = self.lock();
        for bc in items {
            state.push(Delta::new(DeltaType::Sync, DeltaObject::BuildConfig(bc)));
        }
        for (key, last_state) in tombstones {
            tracing::debug!(target: DELTA_LOG_TARGET, %key, "Queueing deletion for key missing from relist");
            state.push(Delta::new(
                DeltaType::Deleted,
                DeltaObject::Tombstone { key, last_state },
            ));
        }
        drop(state);
        self.notify.notify_one();
    }

    /// Put a failed batch back unless newer deltas for its key are queued or
    /// the queue is closed. Returns whether the batch was requeued.
    pub fn add_if_not_present(&self, deltas: Deltas) -> bool {
        let mut state = self.lock();
        if state.closed || state.items.contains_key(&deltas.key) {
            return false;
        }
        state.queue.push_back(deltas.key.clone());
        state.items.insert(deltas.key, deltas.deltas);
        drop(state);
        self.notify.notify_one();
        true
    }

    /// Next batch, waiting for one if needed. `None` once the queue is
    /// closed and drained.
    pub async fn pop(&self) -> Option<Deltas> {
        loop {
            {
                let mut state = self.lock();
                while let Some(key) = state.queue.pop_front() {
                    if let Some(deltas) = state.items.remove(&key) {
                        return Some(Deltas { key, deltas });
                    }
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued keys.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn missing_known_hooks(
    known: &dyn KnownHooks,
    listed: &HashSet<String>,
) -> Vec<(String, Option<crate::hook::Hook>)> {
    let keys = match known.list_keys().await {
        Ok(keys) => keys,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list known hooks, skipping deletions for this relist");
            return Vec::new();
        }
    };

    let mut missing = Vec::new();
    for key in keys {
        if listed.contains(&key) {
            continue;
        }
        let last_state = match known.get_by_key(&key).await {
            Ok(Some(hook)) => Some(hook),
            Ok(None) => {
                tracing::debug!(%key, "Known key vanished before it could be fetched");
                None
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "Failed to fetch known hook");
                None
            }
        };
        missing.push((key, last_state));
    }
    missing
}
