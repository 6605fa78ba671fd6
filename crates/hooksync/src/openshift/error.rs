//! Error types for OpenShift API operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenShiftError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The watch stream broke mid-way.
    #[error("watch stream error: {0}")]
    Stream(String),

    #[error("unexpected watch event type {0:?}")]
    UnknownEvent(String),

    /// The requested resource version is too old (HTTP 410 Gone).
    #[error("watch expired: {0}")]
    WatchExpired(String),

    /// The server sent an `ERROR` watch event.
    #[error("watch error ({code}): {message}")]
    Watch { code: u16, message: String },

    #[error("BuildConfig {key} has no GitHub webhook secret")]
    MissingWebhookSecret { key: String },

    /// Secrets kept in a Secret object are not read.
    #[error("BuildConfig {key} keeps its GitHub webhook secret in Secret {name}, which is not supported")]
    SecretReference { key: String, name: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OpenShiftError {
    /// Whether a relist is needed before watching again.
    pub fn is_expired(&self) -> bool {
        matches!(
            self,
            OpenShiftError::WatchExpired(_) | OpenShiftError::Api { status: 410, .. }
        )
    }
}
