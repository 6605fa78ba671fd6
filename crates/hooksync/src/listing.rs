//! Read-only view of the hooks we manage.

use crate::github::{GitHubError, HooksManager};
use crate::hook::GithubRepository;
use crate::webhook_url::{explode_webhook_url, is_our_hook};

/// One managed webhook, as printed by `hooksync list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRow {
    pub owner: String,
    pub repository: String,
    pub namespace: String,
    pub buildconfig: String,
    pub secret: String,
}

/// Hooks pointing at `public_url` in `org`, or in the single repository
/// `org/repository` when one is given.
///
/// Rows are sorted by owner, repository, namespace then BuildConfig.
pub async fn list_webhooks(
    manager: &HooksManager,
    org: &str,
    repository: Option<&str>,
    public_url: &str,
) -> Result<Vec<WebhookRow>, GitHubError> {
    let hooks = match repository {
        Some(name) => {
            manager
                .list_hooks_for_repository(&GithubRepository::new(org, name))
                .await?
        }
        None => manager.list_hooks_for_organization(org).await?,
    };

    let mut rows: Vec<WebhookRow> = hooks
        .into_iter()
        .filter(|hook| is_our_hook(&hook.target_url, public_url))
        .filter_map(|hook| {
            let target = explode_webhook_url(&hook.target_url)?;
            Some(WebhookRow {
                owner: hook.repository.owner,
                repository: hook.repository.name,
                namespace: target.namespace,
                buildconfig: target.buildconfig,
                secret: target.secret,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.owner, &a.repository, &a.namespace, &a.buildconfig)
            .cmp(&(&b.owner, &b.repository, &b.namespace, &b.buildconfig))
    });
    Ok(rows)
}
