//! Applies desired hook state to GitHub.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::{REMOTE_HOOK_TTL, TtlCache};
use crate::controller::{HandlerError, HookHandler, KnownHooks, REJECTION_LOG_TARGET};
use crate::github::{GitHubError, HooksManager};
use crate::hook::Hook;
use crate::webhook_url::hook_key;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to register hook {hook}: {source}")]
    Register {
        hook: Hook,
        #[source]
        source: GitHubError,
    },

    #[error("failed to delete hook {hook}: {source}")]
    Delete {
        hook: Hook,
        #[source]
        source: GitHubError,
    },

    #[error("failed to list hooks of organization {org}: {source}")]
    ListHooks {
        org: String,
        #[source]
        source: GitHubError,
    },
}

/// [`HookHandler`] that registers and deletes GitHub hooks of one
/// organization.
///
/// Hooks that point at the OpenShift public URL are the ones we own; the
/// known keys are derived from their URLs. Listed hooks are cached for
/// [`REMOTE_HOOK_TTL`] so that repeated syncs of an unchanged BuildConfig
/// don't hit GitHub.
pub struct HookSyncer {
    manager: HooksManager,
    organization: String,
    public_url: String,
    dry_run: bool,
    cache: TtlCache<Hook>,
}

impl HookSyncer {
    pub fn new(
        manager: HooksManager,
        organization: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            organization: organization.into(),
            public_url: public_url.into(),
            dry_run: false,
            cache: TtlCache::new(REMOTE_HOOK_TTL),
        }
    }

    /// Log what would change instead of calling GitHub.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// List our hooks from GitHub, refreshing the cache.
    async fn list_our_hooks(&self) -> Result<Vec<(String, Hook)>, SyncError> {
        let hooks = self
            .manager
            .list_hooks_for_organization(&self.organization)
            .await
            .map_err(|source| SyncError::ListHooks {
                org: self.organization.clone(),
                source,
            })?;

        let mut ours: Vec<(String, Hook)> = hooks
            .into_iter()
            .filter_map(|hook| hook_key(&hook.target_url, &self.public_url).map(|key| (key, hook)))
            .collect();
        ours.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, hook) in &ours {
            self.cache.insert(key.clone(), hook.clone());
        }
        tracing::debug!(org = %self.organization, count = ours.len(), "Listed known hooks");
        Ok(ours)
    }

    fn is_cached(&self, key: Option<&str>, hook: &Hook) -> bool {
        key.and_then(|key| self.cache.get(key)).is_some_and(|cached| {
            cached.repository == hook.repository && cached.target_url == hook.target_url
        })
    }

    async fn register(&self, hook: Hook) -> Result<(), SyncError> {
        let key = hook_key(&hook.target_url, &self.public_url);
        if self.is_cached(key.as_deref(), &hook) {
            tracing::trace!(%hook, "Hook is already registered");
            return Ok(());
        }

        match self.manager.register_hook(&hook).await {
            Ok(_) => {
                if let Some(key) = key {
                    self.cache.insert(key, hook);
                }
                Ok(())
            }
            Err(source) => Err(SyncError::Register { hook, source }),
        }
    }

    async fn delete(&self, hook: Hook) -> Result<(), SyncError> {
        match self.manager.delete_hook(&hook).await {
            Ok(_) => {
                if let Some(key) = hook_key(&hook.target_url, &self.public_url) {
                    self.cache.remove(&key);
                }
                Ok(())
            }
            Err(source) => Err(SyncError::Delete { hook, source }),
        }
    }
}

#[async_trait]
impl KnownHooks for HookSyncer {
    async fn list_keys(&self) -> Result<Vec<String>, HandlerError> {
        let mut keys: Vec<String> = self
            .list_our_hooks()
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        keys.dedup();
        Ok(keys)
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Hook>, HandlerError> {
        if let Some(hook) = self.cache.get(key) {
            return Ok(Some(hook));
        }
        let hook = self
            .list_our_hooks()
            .await?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, hook)| hook);
        Ok(hook)
    }
}

#[async_trait]
impl HookHandler for HookSyncer {
    async fn handle_hook(&self, hook: Hook) -> Result<(), HandlerError> {
        if !hook.repository.owner.eq_ignore_ascii_case(&self.organization) {
            tracing::trace!(target: REJECTION_LOG_TARGET, %hook, org = %self.organization, "Ignoring hook outside of organization");
            return Ok(());
        }

        if self.dry_run {
            let action = if hook.enabled { "registered" } else { "deleted" };
            tracing::info!(%hook, "Dry run: would have {action} hook");
            return Ok(());
        }

        if hook.enabled {
            self.register(hook).await?;
        } else {
            self.delete(hook).await?;
        }
        Ok(())
    }
}
