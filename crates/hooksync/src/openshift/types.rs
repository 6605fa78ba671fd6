//! BuildConfig wire types (the subset of `build.openshift.io/v1` we read).

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Trigger type tag of a GitHub webhook trigger.
pub const GITHUB_TRIGGER_TYPE: &str = "GitHub";

/// Decode `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: BuildConfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildConfigSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: BuildSource,
    #[serde(default, deserialize_with = "null_as_default")]
    pub triggers: Vec<BuildTriggerPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildSource {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitBuildSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GitBuildSource {
    #[serde(default)]
    pub uri: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildTriggerPolicy {
    #[serde(rename = "type", default)]
    pub trigger_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<WebHookTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<WebHookTrigger>,
}

impl BuildTriggerPolicy {
    pub fn is_github(&self) -> bool {
        self.trigger_type == GITHUB_TRIGGER_TYPE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebHookTrigger {
    #[serde(default)]
    pub secret: String,
    /// Secret object holding the webhook secret under `WebHookSecretKey`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_reference: Option<SecretLocalReference>,
}

impl WebHookTrigger {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            secret_reference: None,
        }
    }

    /// Name of the referenced Secret when no inline secret is set.
    pub fn referenced_secret(&self) -> Option<&str> {
        if !self.secret.is_empty() {
            return None;
        }
        self.secret_reference.as_ref().map(|r| r.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretLocalReference {
    #[serde(default)]
    pub name: String,
}

impl BuildConfig {
    /// Queue key, `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    pub fn git_uri(&self) -> Option<&str> {
        self.spec.source.git.as_ref().map(|git| git.uri.as_str())
    }

    /// First trigger of type `GitHub`.
    pub fn github_trigger(&self) -> Option<&BuildTriggerPolicy> {
        self.spec.triggers.iter().find(|t| t.is_github())
    }

    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.metadata.annotations.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default)]
    pub resource_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildConfigList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<BuildConfig>,
}

/// API `Status` object, carried by watch `ERROR` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Status {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// One event of a BuildConfig watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(BuildConfig),
    Modified(BuildConfig),
    Deleted(BuildConfig),
    Error(Status),
}
