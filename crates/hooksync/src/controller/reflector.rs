//! List/watch loop feeding the delta queue.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;

use super::DeltaType;
use super::queue::DeltaFifo;
use crate::openshift::{BuildConfig, BuildConfigSource, OpenShiftError, WatchEvent};
use crate::retry::{Backoff, RetryConfig, reconnect_backoff};

/// A watch closed sooner than this is resumed after a back-off.
const MIN_WATCH_DURATION: Duration = Duration::from_secs(1);

/// Why a watch ended.
#[derive(Debug)]
enum WatchOutcome {
    Stopped,
    /// The resync deadline passed.
    Resync,
    /// The server closed the stream cleanly.
    Closed,
    Failed(OpenShiftError),
}

/// Mirrors every BuildConfig change into a [`DeltaFifo`].
///
/// After an initial list, the reflector watches from the list's resource
/// version. A cleanly closed watch is resumed from the last seen version,
/// after a back-off if it closed right away. A failed watch backs off and
/// relists. Every `resync_period` (zero disables it) the watch is dropped
/// for a full relist, which produces a `Sync` delta per BuildConfig and
/// tombstones for known keys that vanished.
pub struct Reflector {
    source: Arc<dyn BuildConfigSource>,
    queue: Arc<DeltaFifo>,
    resync_period: Duration,
    retry: RetryConfig,
}

impl Reflector {
    pub fn new(
        source: Arc<dyn BuildConfigSource>,
        queue: Arc<DeltaFifo>,
        resync_period: Duration,
    ) -> Self {
        Self {
            source,
            queue,
            resync_period,
            retry: RetryConfig::default(),
        }
    }

    /// List every BuildConfig into the queue and return the list's resource
    /// version.
    pub async fn list_and_replace(&self) -> Result<String, OpenShiftError> {
        let list = self.source.list().await?;
        tracing::debug!(
            count = list.items.len(),
            resource_version = %list.metadata.resource_version,
            "Listed BuildConfigs"
        );
        let resource_version = list.metadata.resource_version;
        self.queue.replace(list.items).await;
        Ok(resource_version)
    }

    /// Watch from `resource_version` until `stop` flips to `true`.
    pub async fn run_from(&self, mut resource_version: String, mut stop: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.retry.clone());
        let mut resync_at = self.next_resync();

        loop {
            let started = Instant::now();
            let outcome = self
                .watch(&mut resource_version, resync_at, &mut stop)
                .await;

            match outcome {
                WatchOutcome::Stopped => break,
                WatchOutcome::Closed if started.elapsed() < MIN_WATCH_DURATION => {
                    let delay = backoff.next_delay();
                    tracing::debug!(%resource_version, ?delay, "Watch closed right away, resuming after back-off");
                    tokio::select! {
                        _ = stopped(&mut stop) => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
                WatchOutcome::Closed => {
                    tracing::debug!(%resource_version, "Watch closed, resuming");
                    backoff.reset();
                    continue;
                }
                WatchOutcome::Resync => {
                    tracing::debug!("Resync period elapsed, relisting BuildConfigs");
                }
                WatchOutcome::Failed(e) if e.is_expired() => {
                    tracing::debug!(error = %e, "Watch expired, relisting BuildConfigs");
                }
                WatchOutcome::Failed(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, ?delay, "Watch failed, relisting after back-off");
                    tokio::select! {
                        _ = stopped(&mut stop) => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            match self.relist(&mut stop).await {
                Some(rv) => {
                    resource_version = rv;
                    resync_at = self.next_resync();
                    backoff.reset();
                }
                None => break,
            }
        }

        tracing::debug!("Reflector stopped");
    }

    fn next_resync(&self) -> Option<Instant> {
        (!self.resync_period.is_zero()).then(|| Instant::now() + self.resync_period)
    }

    /// Relist with back-off until it succeeds. `None` if stopped first.
    async fn relist(&self, stop: &mut watch::Receiver<bool>) -> Option<String> {
        let attempt = || self.list_and_replace();
        let listing = attempt
            .retry(reconnect_backoff())
            .sleep(tokio::time::sleep)
            .notify(|e: &OpenShiftError, delay: Duration| {
                tracing::warn!(error = %e, ?delay, "Failed to list BuildConfigs, retrying");
            });

        tokio::select! {
            _ = stopped(stop) => None,
            result = listing => match result {
                Ok(rv) => Some(rv),
                Err(e) => {
                    tracing::error!(error = %e, "Giving up listing BuildConfigs");
                    None
                }
            },
        }
    }

    async fn watch(
        &self,
        resource_version: &mut String,
        resync_at: Option<Instant>,
        stop: &mut watch::Receiver<bool>,
    ) -> WatchOutcome {
        let mut stream = tokio::select! {
            _ = stopped(stop) => return WatchOutcome::Stopped,
            _ = resync_timer(resync_at) => return WatchOutcome::Resync,
            result = self.source.watch(resource_version) => match result {
                Ok(stream) => stream,
                Err(e) => return WatchOutcome::Failed(e),
            },
        };

        loop {
            tokio::select! {
                _ = stopped(stop) => return WatchOutcome::Stopped,
                _ = resync_timer(resync_at) => return WatchOutcome::Resync,
                event = stream.next() => match event {
                    None => return WatchOutcome::Closed,
                    Some(Err(e)) => return WatchOutcome::Failed(e),
                    Some(Ok(event)) => {
                        if let Err(e) = self.apply(event, resource_version) {
                            return WatchOutcome::Failed(e);
                        }
                    }
                },
            }
        }
    }

    fn apply(&self, event: WatchEvent, resource_version: &mut String) -> Result<(), OpenShiftError> {
        let (delta_type, bc) = match event {
            WatchEvent::Added(bc) => (DeltaType::Added, bc),
            WatchEvent::Modified(bc) => (DeltaType::Updated, bc),
            WatchEvent::Deleted(bc) => (DeltaType::Deleted, bc),
            WatchEvent::Error(status) if status.code == 410 => {
                return Err(OpenShiftError::WatchExpired(status.message));
            }
            WatchEvent::Error(status) => {
                return Err(OpenShiftError::Watch {
                    code: status.code,
                    message: status.message,
                });
            }
        };

        track_resource_version(&bc, resource_version);
        tracing::trace!(key = %bc.key(), ?delta_type, "Watch event");
        self.queue.add(delta_type, bc);
        Ok(())
    }
}

fn track_resource_version(bc: &BuildConfig, resource_version: &mut String) {
    if let Some(rv) = bc.metadata.resource_version.as_deref()
        && !rv.is_empty()
    {
        *resource_version = rv.to_string();
    }
}

/// Resolves once `stop` holds `true` or its sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn resync_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
