//! Reconciliation of BuildConfigs into webhook operations.
//!
//! The [`reflector`] lists and watches BuildConfigs into a [`DeltaFifo`];
//! the [`BuildConfigsController`] pops batches of deltas per key, turns
//! accepted BuildConfigs into [`Hook`]s and hands them to a [`HookHandler`].
//! Failed batches are requeued under the governance of a [`RetryManager`].

mod build_configs;
mod queue;
mod reflector;
mod retry;

use async_trait::async_trait;
use thiserror::Error;

use crate::hook::Hook;
use crate::openshift::{BuildConfig, OpenShiftError};

pub use build_configs::{BuildConfigsController, DEFAULT_RESYNC_PERIOD};
pub use queue::DeltaFifo;
pub use reflector::Reflector;
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryManager};

/// Log target of per-delta handling.
pub const DELTA_LOG_TARGET: &str = "hooksync::delta";
/// Log target of the reasons a BuildConfig or hook is skipped.
pub const REJECTION_LOG_TARGET: &str = "hooksync::rejection";

/// Error type returned by handler callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaType {
    Added,
    Updated,
    Deleted,
    /// Produced by a full relist.
    Sync,
}

/// Payload of a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaObject {
    BuildConfig(BuildConfig),
    /// A key that disappeared while nobody was watching. `last_state` is what
    /// the known-hooks source remembered for it, if anything.
    Tombstone {
        key: String,
        last_state: Option<Hook>,
    },
}

impl DeltaObject {
    pub fn key(&self) -> String {
        match self {
            DeltaObject::BuildConfig(bc) => bc.key(),
            DeltaObject::Tombstone { key, .. } => key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub delta_type: DeltaType,
    pub object: DeltaObject,
}

impl Delta {
    pub fn new(delta_type: DeltaType, object: DeltaObject) -> Self {
        Self { delta_type, object }
    }
}

/// Ordered deltas accumulated for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deltas {
    pub key: String,
    pub deltas: Vec<Delta>,
}

/// Hooks that exist remotely, keyed by `namespace/name`.
///
/// Consulted on every relist so that keys which vanished from OpenShift
/// still get a deletion.
#[async_trait]
pub trait KnownHooks: Send + Sync {
    async fn list_keys(&self) -> Result<Vec<String>, HandlerError>;

    async fn get_by_key(&self, key: &str) -> Result<Option<Hook>, HandlerError>;
}

/// Applies desired hook state.
#[async_trait]
pub trait HookHandler: KnownHooks {
    async fn handle_hook(&self, hook: Hook) -> Result<(), HandlerError>;
}

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The initial BuildConfig listing failed, so no watch was started.
    #[error("failed to list BuildConfigs: {0}")]
    InitialList(#[source] OpenShiftError),

    #[error("failed to build webhook URL for {key}: {source}")]
    WebhookUrl {
        key: String,
        #[source]
        source: OpenShiftError,
    },

    #[error("BuildConfig {key} has no GitHub repository in source URI {uri:?}")]
    UnknownRepository { key: String, uri: String },

    #[error("hook handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("reflector task failed: {0}")]
    Reflector(String),
}
