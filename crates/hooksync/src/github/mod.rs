//! GitHub side of the synchronisation.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`types`] - Hook and repository payloads
//! - [`client`] - REST client (paginated listing, create, delete)
//! - [`manager`] - Semaphore-gated hook registration and fan-out listing

mod client;
mod error;
mod manager;
mod pagination;
mod types;

pub use client::{DEFAULT_GITHUB_BASE_URL, GitHubClient};
pub use error::GitHubError;
pub use manager::HooksManager;
pub use pagination::{LinkPagination, parse_link_header};
pub use types::{
    DEFAULT_LIST_CONCURRENCY, DEFAULT_SYNC_CONCURRENCY, NewHook, NewHookConfig, PER_PAGE,
    RemoteHook, RemoteHookConfig, RemoteOwner, RemoteRepository,
};
