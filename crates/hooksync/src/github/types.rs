//! GitHub REST payloads used by the hooks endpoints.

use serde::{Deserialize, Serialize};

/// Page size used for every paginated listing.
pub const PER_PAGE: u32 = 100;

/// Default concurrency for the long-running sync.
pub const DEFAULT_SYNC_CONCURRENCY: usize = 5;

/// Default concurrency for one-shot listings.
pub const DEFAULT_LIST_CONCURRENCY: usize = 10;

/// A repository webhook as returned by `GET /repos/{owner}/{repo}/hooks`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteHook {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub config: RemoteHookConfig,
}

impl RemoteHook {
    /// Delivery URL, if the hook has a non-empty one.
    pub fn url(&self) -> Option<&str> {
        self.config.url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteHookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub insecure_ssl: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteOwner {
    pub login: String,
}

/// An entry of `GET /orgs/{org}/repos` or `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteRepository {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub owner: RemoteOwner,
}

/// Body of `POST /repos/{owner}/{repo}/hooks`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewHook {
    pub name: String,
    pub active: bool,
    pub events: Vec<String>,
    pub config: NewHookConfig,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewHookConfig {
    pub url: String,
    pub content_type: String,
    /// GitHub expects the string form here.
    pub insecure_ssl: String,
}

impl NewHook {
    /// A JSON `web` hook delivering every event to `target_url`.
    pub fn web(target_url: &str) -> Self {
        Self {
            name: "web".to_string(),
            active: true,
            events: vec!["*".to_string()],
            config: NewHookConfig {
                url: target_url.to_string(),
                content_type: "json".to_string(),
                insecure_ssl: "true".to_string(),
            },
        }
    }
}
