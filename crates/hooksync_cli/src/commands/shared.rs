use std::time::Duration;

use hooksync::github::{DEFAULT_GITHUB_BASE_URL, GitHubClient, HooksManager};
use hooksync::http::reqwest_transport::ReqwestTransport;
use hooksync::openshift::{OpenShiftConfig as ClusterConfig, discover_public_url};

use crate::config::Config;

const MISSING_TOKEN: &str = "Empty GitHub Access Token. Please provide one either with the \
--github-token flag or the GITHUB_ACCESS_TOKEN environment variable.";
const MISSING_ORGANIZATION: &str = "Empty GitHub Organization Name. Please provide one either \
with the --organization flag or the GITHUB_ORGANIZATION environment variable.";

/// Timeout of the public URL discovery request.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// GitHub options shared by `sync` and `list`.
#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct GitHubArgs {
    /// GitHub access token (needs the repo and admin:repo_hook scopes)
    #[arg(long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    pub(crate) github_token: Option<String>,

    /// GitHub API base URL, for GitHub Enterprise: https://github.domain.tld/api/v3/
    /// [default: https://api.github.com/]
    #[arg(long)]
    pub(crate) github_base_url: Option<String>,

    /// Don't verify the certificate of the GitHub API
    #[arg(long)]
    pub(crate) github_insecure_skip_tls_verify: bool,

    /// GitHub organization whose hooks are managed
    #[arg(long, env = "GITHUB_ORGANIZATION")]
    pub(crate) organization: Option<String>,
}

/// GitHub settings after merging flags with the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GitHubSettings {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) insecure_skip_tls_verify: bool,
    pub(crate) organization: String,
}

impl GitHubSettings {
    pub(crate) fn manager(&self, concurrency: usize) -> Result<HooksManager, Box<dyn std::error::Error>> {
        let client = GitHubClient::new(&self.base_url, &self.token, self.insecure_skip_tls_verify)?;
        Ok(HooksManager::new(client, concurrency))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl GitHubArgs {
    /// Flags win over the config file. Token and organization are required.
    pub(crate) fn resolve(self, config: &Config) -> Result<GitHubSettings, String> {
        let token = non_empty(self.github_token)
            .or_else(|| non_empty(config.github.token.clone()))
            .ok_or(MISSING_TOKEN)?;
        let organization = non_empty(self.organization)
            .or_else(|| non_empty(config.github.organization.clone()))
            .ok_or(MISSING_ORGANIZATION)?;
        let base_url = non_empty(self.github_base_url)
            .or_else(|| non_empty(config.github.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_GITHUB_BASE_URL.to_string());

        Ok(GitHubSettings {
            token,
            base_url,
            insecure_skip_tls_verify: self.github_insecure_skip_tls_verify
                || config.github.insecure_skip_tls_verify,
            organization,
        })
    }
}

/// OpenShift API server: flag (or `OPENSHIFT_SERVER`), then config, then
/// the in-cluster service.
pub(crate) fn resolve_server(flag: Option<String>, config: &Config) -> Option<String> {
    non_empty(flag)
        .or_else(|| non_empty(config.openshift.server.clone()))
        .or_else(|| ClusterConfig::in_cluster().map(|c| c.server))
}

/// Public URL of the OpenShift master: flag, then config, then asked from
/// the server. Empty when nothing is known.
pub(crate) async fn resolve_public_url(
    flag: Option<String>,
    config: &Config,
    server: Option<&str>,
) -> String {
    if let Some(url) = non_empty(flag).or_else(|| non_empty(config.openshift.public_url.clone())) {
        return url;
    }
    let Some(server) = server else {
        tracing::warn!("No OpenShift server configured, hook URLs will not be rewritten");
        return String::new();
    };

    match ReqwestTransport::with_options(Some(DISCOVERY_TIMEOUT), true) {
        Ok(transport) => discover_public_url(&transport, server).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build discovery client, using the server URL");
            server.trim_end_matches('/').to_string()
        }
    }
}
