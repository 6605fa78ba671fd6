//! Hook registration and listing on top of [`GitHubClient`].

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};

use super::client::GitHubClient;
use super::error::GitHubError;
use super::types::NewHook;
use crate::hook::{GithubRepository, Hook};

/// Registers, deletes and lists repository hooks.
///
/// Every GitHub call made by the manager holds a permit of a shared
/// semaphore, which caps the number of requests in flight.
#[derive(Clone)]
pub struct HooksManager {
    client: GitHubClient,
    semaphore: Arc<Semaphore>,
}

impl HooksManager {
    pub fn new(client: GitHubClient, concurrency: usize) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Create the hook unless one with the same URL already exists.
    ///
    /// Returns `true` if a hook was created.
    pub async fn register_hook(&self, hook: &Hook) -> Result<bool, GitHubError> {
        let repo = &hook.repository;
        tracing::debug!(repository = %repo, url = %hook.target_url, "Creating hook");
        let _permit = self.permit().await?;

        let existing = self.client.list_hooks(&repo.owner, &repo.name).await?;
        if existing
            .iter()
            .any(|h| h.url() == Some(hook.target_url.as_str()))
        {
            tracing::debug!(repository = %repo, url = %hook.target_url, "Hook already exists, nothing to do");
            return Ok(false);
        }

        self.client
            .create_hook(&repo.owner, &repo.name, &NewHook::web(&hook.target_url))
            .await?;
        tracing::info!(repository = %repo, url = %hook.target_url, "Hook created");
        Ok(true)
    }

    /// Delete every hook whose URL matches.
    ///
    /// Returns the number of hooks deleted.
    pub async fn delete_hook(&self, hook: &Hook) -> Result<usize, GitHubError> {
        let repo = &hook.repository;
        tracing::debug!(repository = %repo, url = %hook.target_url, "Deleting hook");
        let _permit = self.permit().await?;

        let existing = self.client.list_hooks(&repo.owner, &repo.name).await?;
        let mut deleted = 0;
        for remote in existing
            .iter()
            .filter(|h| h.url() == Some(hook.target_url.as_str()))
        {
            self.client
                .delete_hook(&repo.owner, &repo.name, remote.id)
                .await?;
            tracing::info!(repository = %repo, url = %hook.target_url, id = remote.id, "Hook deleted");
            deleted += 1;
        }

        if deleted == 0 {
            tracing::debug!(repository = %repo, url = %hook.target_url, "Hook not found, nothing to do");
        }
        Ok(deleted)
    }

    /// Hooks of every repository of `org`.
    ///
    /// Repositories whose hooks cannot be listed are logged and skipped.
    pub async fn list_hooks_for_organization(&self, org: &str) -> Result<Vec<Hook>, GitHubError> {
        tracing::debug!(org, "Listing hooks for organization");
        let repos = {
            let _permit = self.permit().await?;
            self.client.list_org_repos(org).await?
        };
        let repositories = repos
            .into_iter()
            .map(|r| GithubRepository::new(r.owner.login, r.name))
            .collect();
        self.list_hooks_for_repositories(repositories).await
    }

    /// Hooks of a single repository. Fails if the repository does not exist.
    pub async fn list_hooks_for_repository(
        &self,
        repository: &GithubRepository,
    ) -> Result<Vec<Hook>, GitHubError> {
        tracing::debug!(%repository, "Listing hooks for repository");
        {
            let _permit = self.permit().await?;
            self.client
                .get_repo(&repository.owner, &repository.name)
                .await?;
        }
        self.list_hooks_for_repositories(vec![repository.clone()])
            .await
    }

    /// Fan out one listing task per repository and collect every hook with a
    /// non-empty URL. The order of the result is unspecified.
    async fn list_hooks_for_repositories(
        &self,
        repositories: Vec<GithubRepository>,
    ) -> Result<Vec<Hook>, GitHubError> {
        let (tx, mut rx) = mpsc::channel::<Hook>(64);
        let collector = tokio::spawn(async move {
            let mut hooks = Vec::new();
            while let Some(hook) = rx.recv().await {
                hooks.push(hook);
            }
            hooks
        });

        let mut handles = Vec::with_capacity(repositories.len());
        for repository in repositories {
            let permit = self.owned_permit().await?;
            let client = self.client.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let remote = match client.list_hooks(&repository.owner, &repository.name).await {
                    Ok(remote) => remote,
                    Err(e) => {
                        tracing::error!(%repository, error = %e, "Failed to list hooks for repository");
                        return;
                    }
                };
                for hook in &remote {
                    let Some(url) = hook.url() else {
                        tracing::trace!(%repository, id = hook.id, "Ignoring hook without URL");
                        continue;
                    };
                    if tx
                        .send(Hook::new(true, url, repository.clone()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }));
        }
        drop(tx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Hook listing task failed");
            }
        }

        collector
            .await
            .map_err(|e| GitHubError::Internal(e.to_string()))
    }

    async fn permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, GitHubError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| GitHubError::Internal("Semaphore closed unexpectedly".to_string()))
    }

    async fn owned_permit(&self) -> Result<tokio::sync::OwnedSemaphorePermit, GitHubError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GitHubError::Internal("Semaphore closed unexpectedly".to_string()))
    }
}
