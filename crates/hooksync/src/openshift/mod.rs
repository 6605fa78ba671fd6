//! OpenShift side of the synchronisation: BuildConfig types, list/watch and
//! webhook URL minting.

mod client;
mod error;
mod public_url;
mod types;
mod watch;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub use client::{OpenShiftClient, OpenShiftConfig, SERVICE_ACCOUNT_DIR, github_webhook_url};
pub use error::OpenShiftError;
pub use public_url::discover_public_url;
pub use types::{
    BuildConfig, BuildConfigList, BuildConfigSpec, BuildSource, BuildTriggerPolicy,
    GITHUB_TRIGGER_TYPE, GitBuildSource, ListMeta, ObjectMeta, SecretLocalReference, Status,
    WatchEvent, WebHookTrigger,
};
pub use watch::{decode_watch_stream, parse_watch_line};

/// Events of a running watch. The stream ends when the server closes it.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, OpenShiftError>>;

/// Where BuildConfigs come from.
#[async_trait]
pub trait BuildConfigSource: Send + Sync {
    /// Every BuildConfig in every namespace, with the list resource version.
    async fn list(&self) -> Result<BuildConfigList, OpenShiftError>;

    /// Changes after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream, OpenShiftError>;

    /// Webhook URL OpenShift serves for the given GitHub trigger.
    fn webhook_url(
        &self,
        bc: &BuildConfig,
        trigger: &BuildTriggerPolicy,
    ) -> Result<String, OpenShiftError>;
}
