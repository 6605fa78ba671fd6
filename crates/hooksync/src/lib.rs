//! hooksync - keeps GitHub webhooks in sync with OpenShift BuildConfigs.
//!
//! Every BuildConfig with a git source on GitHub and a `GitHub` trigger gets a
//! repository hook pointing at the OpenShift webhook URL of that trigger.
//! When the BuildConfig goes away, so does the hook.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hooksync::controller::BuildConfigsController;
//! use hooksync::github::{GitHubClient, HooksManager, DEFAULT_SYNC_CONCURRENCY};
//! use hooksync::openshift::{OpenShiftClient, OpenShiftConfig};
//! use hooksync::sync::HookSyncer;
//!
//! let github = GitHubClient::new("https://api.github.com/", &token, false)?;
//! let manager = HooksManager::new(github, DEFAULT_SYNC_CONCURRENCY);
//! let syncer = Arc::new(HookSyncer::new(manager, "acme", &public_url));
//!
//! let cluster = OpenShiftConfig::in_cluster().ok_or("not running in a cluster")?;
//! let openshift = Arc::new(OpenShiftClient::new(&cluster)?);
//! let controller = BuildConfigsController::new(openshift, syncer, &public_url);
//! controller.run_until(stop_rx).await?;
//! ```

pub mod cache;
pub mod controller;
pub mod github;
pub mod hook;
pub mod http;
pub mod listing;
pub mod openshift;
pub mod rate_limit;
pub mod retry;
pub mod sync;
pub mod webhook_url;

pub use controller::{BuildConfigsController, ControllerError, HookHandler, KnownHooks};
pub use github::{GitHubClient, GitHubError, HooksManager};
pub use hook::{GithubRepository, Hook};
pub use listing::{WebhookRow, list_webhooks};
pub use openshift::{OpenShiftClient, OpenShiftConfig, OpenShiftError};
pub use sync::{HookSyncer, SyncError};
