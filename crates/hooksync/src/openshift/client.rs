//! OpenShift REST client for BuildConfigs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::error::OpenShiftError;
use super::types::{BuildConfig, BuildConfigList, BuildTriggerPolicy, WebHookTrigger};
use super::watch::decode_watch_stream;
use super::{BuildConfigSource, WatchStream};

const LIST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default location of the service account credentials inside a pod.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for the OpenShift API server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenShiftConfig {
    /// API server URL, e.g. `https://master.example.com:8443`.
    pub server: String,
    pub token: Option<String>,
    pub insecure_skip_tls_verify: bool,
    /// PEM bundle trusted in addition to the system roots.
    pub ca_cert: Option<PathBuf>,
}

impl OpenShiftConfig {
    /// Settings derived from the pod environment, if running in a cluster.
    pub fn in_cluster() -> Option<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").ok()?;
        Some(Self::from_service_account(
            &host,
            &port,
            Path::new(SERVICE_ACCOUNT_DIR),
        ))
    }

    fn from_service_account(host: &str, port: &str, dir: &Path) -> Self {
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let token = std::fs::read_to_string(dir.join("token"))
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let ca_cert = Some(dir.join("ca.crt")).filter(|p| p.exists());
        Self {
            server: format!("https://{host}:{port}"),
            token,
            insecure_skip_tls_verify: false,
            ca_cert,
        }
    }
}

/// Lists and watches BuildConfigs across all namespaces.
#[derive(Clone)]
pub struct OpenShiftClient {
    client: reqwest::Client,
    server: String,
    token: Option<String>,
}

impl OpenShiftClient {
    pub fn new(config: &OpenShiftConfig) -> Result<Self, OpenShiftError> {
        if config.server.is_empty() {
            return Err(OpenShiftError::Config(
                "no OpenShift API server configured".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("hooksync/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);
        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                OpenShiftError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            server: config.server.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, OpenShiftError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(OpenShiftError::Api {
            status: status.as_u16(),
            message: message.trim().to_string(),
        })
    }
}

#[async_trait]
impl BuildConfigSource for OpenShiftClient {
    async fn list(&self) -> Result<BuildConfigList, OpenShiftError> {
        let url = format!("{}/oapi/v1/buildconfigs", self.server);
        tracing::debug!(%url, "Listing BuildConfigs");
        let response = self.request(&url).timeout(LIST_TIMEOUT).send().await?;
        let response = Self::check(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, OpenShiftError> {
        let url = format!(
            "{}/oapi/v1/buildconfigs?watch=true&resourceVersion={resource_version}",
            self.server
        );
        tracing::debug!(%url, "Watching BuildConfigs");
        let response = self.request(&url).send().await?;
        let response = Self::check(response).await?;
        Ok(decode_watch_stream(response.bytes_stream()).boxed())
    }

    fn webhook_url(
        &self,
        bc: &BuildConfig,
        trigger: &BuildTriggerPolicy,
    ) -> Result<String, OpenShiftError> {
        github_webhook_url(&self.server, bc, trigger)
    }
}

/// The URL OpenShift serves the GitHub webhook of `trigger` on.
pub fn github_webhook_url(
    server: &str,
    bc: &BuildConfig,
    trigger: &BuildTriggerPolicy,
) -> Result<String, OpenShiftError> {
    if let Some(name) = trigger.github.as_ref().and_then(WebHookTrigger::referenced_secret) {
        return Err(OpenShiftError::SecretReference {
            key: bc.key(),
            name: name.to_string(),
        });
    }
    let secret = trigger
        .github
        .as_ref()
        .map(|g| g.secret.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OpenShiftError::MissingWebhookSecret { key: bc.key() })?;
    Ok(format!(
        "{}/oapi/v1/namespaces/{}/buildconfigs/{}/webhooks/{}/github",
        server.trim_end_matches('/'),
        bc.metadata.namespace,
        bc.metadata.name,
        secret
    ))
}
