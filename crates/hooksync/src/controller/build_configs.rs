use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::queue::DeltaFifo;
use super::reflector::Reflector;
use super::retry::{RetryDecision, RetryManager};
use super::{
    ControllerError, DELTA_LOG_TARGET, DeltaObject, DeltaType, Deltas, HookHandler, KnownHooks,
    REJECTION_LOG_TARGET,
};
use crate::hook::{GithubRepository, Hook, IGNORE_ANNOTATION, parse_annotation_bool};
use crate::openshift::{BuildConfig, BuildConfigSource};
use crate::webhook_url::fix_public_url;

/// Interval between full relists.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Turns BuildConfig changes into calls to a [`HookHandler`].
pub struct BuildConfigsController<H: HookHandler + 'static> {
    source: Arc<dyn BuildConfigSource>,
    handler: Arc<H>,
    public_url: String,
    resync_period: Duration,
    retry: RetryManager,
}

impl<H: HookHandler + 'static> BuildConfigsController<H> {
    pub fn new(
        source: Arc<dyn BuildConfigSource>,
        handler: Arc<H>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            handler,
            public_url: public_url.into(),
            resync_period: DEFAULT_RESYNC_PERIOD,
            retry: RetryManager::default(),
        }
    }

    /// Zero disables periodic relists.
    #[must_use]
    pub fn with_resync_period(mut self, resync_period: Duration) -> Self {
        self.resync_period = resync_period;
        self
    }

    /// Reconcile until `stop` flips to `true`.
    ///
    /// Fails only if the initial listing fails. On stop, batches already
    /// queued are still handled before this returns.
    pub async fn run_until(&self, stop: watch::Receiver<bool>) -> Result<(), ControllerError> {
        let known: Arc<dyn KnownHooks> = self.handler.clone();
        let queue = Arc::new(DeltaFifo::new(Some(known)));
        let reflector = Reflector::new(Arc::clone(&self.source), Arc::clone(&queue), self.resync_period);

        let resource_version = reflector
            .list_and_replace()
            .await
            .map_err(ControllerError::InitialList)?;
        tracing::info!(
            queued = queue.len(),
            "Listed BuildConfigs, watching for changes"
        );

        let reflector_queue = Arc::clone(&queue);
        let reflector_task = tokio::spawn(async move {
            reflector.run_from(resource_version, stop).await;
            reflector_queue.close();
        });

        while let Some(deltas) = queue.pop().await {
            self.process(&queue, deltas).await;
        }

        reflector_task
            .await
            .map_err(|e| ControllerError::Reflector(e.to_string()))
    }

    async fn process(&self, queue: &DeltaFifo, deltas: Deltas) {
        let error = match self.handle(&deltas).await {
            Ok(()) => {
                self.retry.forget(&deltas.key);
                return;
            }
            Err(e) => e,
        };

        match self.retry.record_failure(&deltas.key) {
            RetryDecision::Retry { attempt } => {
                tracing::warn!(key = %deltas.key, attempt, error = %error, "Failed to sync BuildConfig, retrying");
                if queue.is_closed() {
                    return;
                }
                self.retry.wait().await;
                if !queue.add_if_not_present(deltas) {
                    tracing::debug!("Dropped retry superseded by newer changes");
                }
            }
            RetryDecision::GiveUp { attempts } => {
                tracing::error!(key = %deltas.key, attempts, error = %error, "Giving up syncing BuildConfig");
            }
        }
    }

    /// Run every delta of a batch through the handler, in order.
    pub async fn handle(&self, deltas: &Deltas) -> Result<(), ControllerError> {
        for delta in &deltas.deltas {
            match &delta.object {
                DeltaObject::BuildConfig(bc) => {
                    tracing::debug!(target: DELTA_LOG_TARGET, key = %deltas.key, delta_type = ?delta.delta_type, "Handling BuildConfig");
                    if !accept(bc) {
                        continue;
                    }
                    tracing::debug!(target: DELTA_LOG_TARGET, key = %deltas.key, "Accepted BuildConfig");
                    let hook = self.new_hook(bc, delta.delta_type)?;
                    self.dispatch(hook).await?;
                }
                DeltaObject::Tombstone {
                    key,
                    last_state: Some(hook),
                } => {
                    tracing::debug!(target: DELTA_LOG_TARGET, %key, %hook, "Handling hook of vanished BuildConfig");
                    self.dispatch(hook.clone().with_enabled(false)).await?;
                }
                DeltaObject::Tombstone {
                    key,
                    last_state: None,
                } => {
                    tracing::warn!(%key, "No last known hook for vanished BuildConfig, skipping");
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&self, hook: Hook) -> Result<(), ControllerError> {
        self.handler
            .handle_hook(hook)
            .await
            .map_err(ControllerError::Handler)
    }

    /// Desired hook for an accepted BuildConfig.
    pub fn new_hook(&self, bc: &BuildConfig, delta_type: DeltaType) -> Result<Hook, ControllerError> {
        let key = bc.key();
        let uri = bc.git_uri().unwrap_or_default();
        let repository = GithubRepository::parse(uri).ok_or_else(|| ControllerError::UnknownRepository {
            key: key.clone(),
            uri: uri.to_string(),
        })?;

        let target_url = match bc.github_trigger() {
            Some(trigger) => {
                let url = self
                    .source
                    .webhook_url(bc, trigger)
                    .map_err(|source| ControllerError::WebhookUrl { key, source })?;
                fix_public_url(&url, &self.public_url)
            }
            None => String::new(),
        };

        Ok(Hook::new(delta_type != DeltaType::Deleted, target_url, repository))
    }
}

/// Whether a BuildConfig should have a GitHub webhook.
fn accept(bc: &BuildConfig) -> bool {
    let key = bc.key();

    let Some(uri) = bc.git_uri() else {
        tracing::trace!(target: REJECTION_LOG_TARGET, %key, "Ignoring BuildConfig with non-git source");
        return false;
    };
    if !uri.contains("github") {
        tracing::trace!(target: REJECTION_LOG_TARGET, %key, uri, "Ignoring BuildConfig with non-GitHub source");
        return false;
    }
    let Some(trigger) = bc.github_trigger() else {
        tracing::trace!(target: REJECTION_LOG_TARGET, %key, "Ignoring BuildConfig without GitHub trigger");
        return false;
    };
    if let Some(secret) = trigger.github.as_ref().and_then(|g| g.referenced_secret()) {
        tracing::warn!(target: REJECTION_LOG_TARGET, %key, secret, "Ignoring BuildConfig with a webhook secret reference");
        return false;
    }

    if let Some(value) = bc.annotation(IGNORE_ANNOTATION) {
        let ignore = parse_annotation_bool(value).unwrap_or_else(|e| {
            tracing::error!(%key, annotation = IGNORE_ANNOTATION, error = %e, "Failed to parse annotation");
            false
        });
        if ignore {
            tracing::trace!(target: REJECTION_LOG_TARGET, %key, annotation = IGNORE_ANNOTATION, "Ignoring BuildConfig because of annotation");
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::{StreamExt, stream};

    use crate::controller::{Delta, HandlerError};
    use crate::openshift::{
        BuildConfigList, BuildConfigSpec, BuildSource, BuildTriggerPolicy, GitBuildSource,
        ObjectMeta, OpenShiftError, SecretLocalReference, WatchStream, WebHookTrigger,
        github_webhook_url,
    };

    const PUBLIC: &str = "https://public.example.com:8443";

    fn github_bc(name: &str, uri: &str) -> BuildConfig {
        BuildConfig {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: "ns".to_string(),
                ..Default::default()
            },
            spec: BuildConfigSpec {
                source: BuildSource {
                    source_type: Some("Git".to_string()),
                    git: Some(GitBuildSource {
                        uri: uri.to_string(),
                        git_ref: None,
                    }),
                },
                triggers: vec![BuildTriggerPolicy {
                    trigger_type: "GitHub".to_string(),
                    github: Some(WebHookTrigger::with_secret("s3cr3t")),
                    generic: None,
                }],
            },
        }
    }

    fn annotated(mut bc: BuildConfig, value: &str) -> BuildConfig {
        bc.metadata.annotations =
            BTreeMap::from([(IGNORE_ANNOTATION.to_string(), value.to_string())]);
        bc
    }

    struct FakeSource {
        items: Vec<BuildConfig>,
    }

    #[async_trait]
    impl BuildConfigSource for FakeSource {
        async fn list(&self) -> Result<BuildConfigList, OpenShiftError> {
            Ok(BuildConfigList {
                items: self.items.clone(),
                ..Default::default()
            })
        }

        async fn watch(&self, _resource_version: &str) -> Result<WatchStream, OpenShiftError> {
            Ok(stream::pending().boxed())
        }

        fn webhook_url(
            &self,
            bc: &BuildConfig,
            trigger: &BuildTriggerPolicy,
        ) -> Result<String, OpenShiftError> {
            github_webhook_url("https://internal:8443", bc, trigger)
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        known: Vec<Hook>,
        calls: Mutex<Vec<Hook>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn calls(&self) -> Vec<Hook> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KnownHooks for RecordingHandler {
        async fn list_keys(&self) -> Result<Vec<String>, HandlerError> {
            Ok(self
                .known
                .iter()
                .filter_map(|h| crate::webhook_url::hook_key(&h.target_url, PUBLIC))
                .collect())
        }

        async fn get_by_key(&self, key: &str) -> Result<Option<Hook>, HandlerError> {
            Ok(self
                .known
                .iter()
                .find(|h| crate::webhook_url::hook_key(&h.target_url, PUBLIC).as_deref() == Some(key))
                .cloned())
        }
    }

    #[async_trait]
    impl HookHandler for RecordingHandler {
        async fn handle_hook(&self, hook: Hook) -> Result<(), HandlerError> {
            self.calls.lock().unwrap().push(hook);
            if self.fail {
                return Err("github is down".into());
            }
            Ok(())
        }
    }

    fn controller(
        items: Vec<BuildConfig>,
        handler: Arc<RecordingHandler>,
    ) -> BuildConfigsController<RecordingHandler> {
        BuildConfigsController::new(Arc::new(FakeSource { items }), handler, PUBLIC)
            .with_resync_period(Duration::ZERO)
    }

    fn batch(delta_type: DeltaType, bc: BuildConfig) -> Deltas {
        Deltas {
            key: bc.key(),
            deltas: vec![Delta::new(delta_type, DeltaObject::BuildConfig(bc))],
        }
    }

    #[test]
    fn test_acceptance_policy() {
        let plain = github_bc("plain", "https://github.com/acme/app.git");
        assert!(accept(&plain));

        let mut no_source = plain.clone();
        no_source.spec.source = BuildSource::default();
        assert!(!accept(&no_source));

        assert!(!accept(&github_bc("bb", "https://bitbucket.org/acme/app.git")));

        let mut no_trigger = plain.clone();
        no_trigger.spec.triggers[0].trigger_type = "Generic".to_string();
        assert!(!accept(&no_trigger));

        let mut referenced = plain.clone();
        referenced.spec.triggers[0].github = Some(WebHookTrigger {
            secret: String::new(),
            secret_reference: Some(SecretLocalReference {
                name: "hook-secret".to_string(),
            }),
        });
        assert!(!accept(&referenced));

        assert!(!accept(&annotated(plain.clone(), "true")));
        assert!(accept(&annotated(plain.clone(), "whatever")));
        assert!(accept(&annotated(plain, "false")));
    }

    #[test]
    fn test_new_hook_uses_public_url_and_delta_type() {
        let handler = Arc::new(RecordingHandler::default());
        let controller = controller(Vec::new(), handler);
        let bc = github_bc("web", "git@github.com:acme/app.git");

        let hook = controller.new_hook(&bc, DeltaType::Sync).unwrap();
        assert_eq!(
            hook,
            Hook::new(
                true,
                format!("{PUBLIC}/oapi/v1/namespaces/ns/buildconfigs/web/webhooks/s3cr3t/github"),
                GithubRepository::new("acme", "app"),
            )
        );

        let deleted = controller.new_hook(&bc, DeltaType::Deleted).unwrap();
        assert!(!deleted.enabled);
    }

    #[test]
    fn test_new_hook_rejects_unparseable_repository() {
        let handler = Arc::new(RecordingHandler::default());
        let controller = controller(Vec::new(), handler);
        let bc = github_bc("web", "https://github.example.com");

        let err = controller.new_hook(&bc, DeltaType::Added).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownRepository { .. }));
    }

    #[tokio::test]
    async fn test_handle_dispatches_enabled_per_delta_type() {
        let handler = Arc::new(RecordingHandler::default());
        let controller = controller(Vec::new(), Arc::clone(&handler));
        let bc = github_bc("web", "https://github.com/acme/app");

        let deltas = Deltas {
            key: bc.key(),
            deltas: vec![
                Delta::new(DeltaType::Added, DeltaObject::BuildConfig(bc.clone())),
                Delta::new(DeltaType::Updated, DeltaObject::BuildConfig(bc.clone())),
                Delta::new(DeltaType::Sync, DeltaObject::BuildConfig(bc.clone())),
                Delta::new(DeltaType::Deleted, DeltaObject::BuildConfig(bc)),
            ],
        };
        controller.handle(&deltas).await.unwrap();

        let enabled: Vec<_> = handler.calls().iter().map(|h| h.enabled).collect();
        assert_eq!(enabled, vec![true, true, true, false]);
    }

    #[tokio::test]
    async fn test_handle_skips_rejected_and_unknown_tombstones() {
        let handler = Arc::new(RecordingHandler::default());
        let controller = controller(Vec::new(), Arc::clone(&handler));

        let ignored = annotated(github_bc("web", "https://github.com/acme/app"), "1");
        controller
            .handle(&batch(DeltaType::Added, ignored))
            .await
            .unwrap();

        let tombstone = Deltas {
            key: "ns/gone".to_string(),
            deltas: vec![Delta::new(
                DeltaType::Deleted,
                DeltaObject::Tombstone {
                    key: "ns/gone".to_string(),
                    last_state: None,
                },
            )],
        };
        controller.handle(&tombstone).await.unwrap();

        assert!(handler.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_relist_deletes_hooks_of_vanished_build_configs() {
        let url = format!("{PUBLIC}/oapi/v1/namespaces/ns/buildconfigs/bc/webhooks/s/github");
        let known = Hook::new(true, url.clone(), GithubRepository::new("acme", "app"));
        let handler = Arc::new(RecordingHandler {
            known: vec![known],
            ..Default::default()
        });
        let controller = controller(Vec::new(), Arc::clone(&handler));

        let (tx, rx) = watch::channel(false);
        let run = tokio::spawn(async move { controller.run_until(rx).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        run.await.unwrap().unwrap();

        assert_eq!(
            handler.calls(),
            vec![Hook::new(false, url, GithubRepository::new("acme", "app"))]
        );
    }

    #[tokio::test]
    async fn test_relist_disables_hook_of_build_config_with_pending_update() {
        let bc = github_bc("web", "https://github.com/acme/app");
        let url = format!("{PUBLIC}/oapi/v1/namespaces/ns/buildconfigs/web/webhooks/s3cr3t/github");
        let handler = Arc::new(RecordingHandler {
            known: vec![Hook::new(true, url, GithubRepository::new("acme", "app"))],
            ..Default::default()
        });
        let controller = controller(Vec::new(), Arc::clone(&handler));

        let queue = DeltaFifo::new(Some(Arc::clone(&handler) as Arc<dyn KnownHooks>));
        queue.add(DeltaType::Updated, bc);
        queue.replace(Vec::new()).await;
        controller.handle(&queue.pop().await.unwrap()).await.unwrap();

        let enabled: Vec<_> = handler.calls().iter().map(|h| h.enabled).collect();
        assert_eq!(enabled, vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_batch_is_attempted_five_times() {
        let handler = Arc::new(RecordingHandler {
            fail: true,
            ..Default::default()
        });
        let bc = github_bc("web", "https://github.com/acme/app");
        let controller = controller(vec![bc], Arc::clone(&handler));

        let (tx, rx) = watch::channel(false);
        let run = tokio::spawn(async move { controller.run_until(rx).await });
        tokio::time::sleep(Duration::from_secs(30)).await;
        tx.send(true).unwrap();
        run.await.unwrap().unwrap();

        assert_eq!(handler.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_initial_list_failure_stops_controller() {
        struct Unreachable;

        #[async_trait]
        impl BuildConfigSource for Unreachable {
            async fn list(&self) -> Result<BuildConfigList, OpenShiftError> {
                Err(OpenShiftError::Api {
                    status: 401,
                    message: "Unauthorized".to_string(),
                })
            }

            async fn watch(&self, _rv: &str) -> Result<WatchStream, OpenShiftError> {
                Ok(stream::empty().boxed())
            }

            fn webhook_url(
                &self,
                _bc: &BuildConfig,
                _trigger: &BuildTriggerPolicy,
            ) -> Result<String, OpenShiftError> {
                Ok(String::new())
            }
        }

        let handler = Arc::new(RecordingHandler::default());
        let controller = BuildConfigsController::new(Arc::new(Unreachable), handler, PUBLIC);
        let (_tx, rx) = watch::channel(false);

        let err = controller.run_until(rx).await.unwrap_err();
        assert!(matches!(err, ControllerError::InitialList(_)));
    }
}
