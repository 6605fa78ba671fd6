use std::sync::Arc;
use std::time::Duration;

use hooksync::controller::{BuildConfigsController, DEFAULT_RESYNC_PERIOD};
use hooksync::github::DEFAULT_SYNC_CONCURRENCY;
use hooksync::openshift::{OpenShiftClient, OpenShiftConfig as ClusterConfig};
use hooksync::sync::HookSyncer;

use crate::commands::shared::{GitHubArgs, resolve_public_url, resolve_server};
use crate::config::Config;
use crate::shutdown::setup_shutdown_handler;

/// Options of `hooksync sync`.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SyncArgs {
    #[command(flatten)]
    pub(crate) github: GitHubArgs,

    /// OpenShift API server URL [default: in-cluster service]
    #[arg(long, env = "OPENSHIFT_SERVER")]
    pub(crate) openshift_server: Option<String>,

    /// OpenShift bearer token [default: service account token]
    #[arg(long, env = "OPENSHIFT_TOKEN", hide_env_values = true)]
    pub(crate) openshift_token: Option<String>,

    /// Don't verify the certificate of the OpenShift API
    #[arg(long)]
    pub(crate) openshift_insecure_skip_tls_verify: bool,

    /// Public URL of the OpenShift master, used in the webhook URLs [default: discovered]
    #[arg(long)]
    pub(crate) openshift_public_url: Option<String>,

    /// Interval between full resyncs, e.g. 30m or 1h; 0 disables them [default: 1h]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) resync_period: Option<Duration>,

    /// Log the hooks that would be created or deleted without touching GitHub
    #[arg(short = 'n', long)]
    pub(crate) dry_run: bool,
}

impl SyncArgs {
    /// Connection settings of the OpenShift API.
    fn cluster_config(&self, config: &Config) -> Result<ClusterConfig, String> {
        let in_cluster = ClusterConfig::in_cluster();
        let server = resolve_server(self.openshift_server.clone(), config).ok_or(
            "No OpenShift server. Please provide one either with the --openshift-server flag or \
the OPENSHIFT_SERVER environment variable.",
        )?;

        // The service account only applies to the in-cluster server.
        let service_account = in_cluster.filter(|c| c.server == server);
        let token = self
            .openshift_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| config.openshift.token.clone().filter(|t| !t.is_empty()))
            .or_else(|| service_account.as_ref().and_then(|c| c.token.clone()));

        Ok(ClusterConfig {
            server,
            token,
            insecure_skip_tls_verify: self.openshift_insecure_skip_tls_verify
                || config.openshift.insecure_skip_tls_verify,
            ca_cert: service_account.and_then(|c| c.ca_cert),
        })
    }

    fn resync_period(&self, config: &Config) -> Duration {
        self.resync_period
            .or_else(|| config.resync_period())
            .unwrap_or(DEFAULT_RESYNC_PERIOD)
    }
}

/// Run the sync daemon until SIGINT or SIGTERM.
pub(crate) async fn handle_sync(
    args: SyncArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let github = args.github.clone().resolve(config)?;
    let cluster = args.cluster_config(config)?;
    let resync_period = args.resync_period(config);
    let dry_run = args.dry_run || config.sync.dry_run;

    let public_url = resolve_public_url(
        args.openshift_public_url.clone(),
        config,
        Some(cluster.server.as_str()),
    )
    .await;

    tracing::info!(
        organization = %github.organization,
        server = %cluster.server,
        public_url = %public_url,
        ?resync_period,
        dry_run,
        "Starting hook sync"
    );

    let manager = github.manager(DEFAULT_SYNC_CONCURRENCY)?;
    let syncer = HookSyncer::new(manager, github.organization.as_str(), public_url.as_str())
        .with_dry_run(dry_run);
    let source = OpenShiftClient::new(&cluster)?;

    let controller = BuildConfigsController::new(Arc::new(source), Arc::new(syncer), public_url)
        .with_resync_period(resync_period);

    let stop = setup_shutdown_handler();
    controller.run_until(stop).await?;

    tracing::info!("Hook sync stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SyncArgs,
    }

    fn parse(argv: &[&str]) -> SyncArgs {
        let mut full = vec!["sync"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_resync_period_flag() {
        let args = parse(&["--resync-period", "30m"]);
        assert_eq!(
            args.resync_period(&Config::default()),
            Duration::from_secs(30 * 60)
        );

        let args = parse(&["--resync-period", "0"]);
        assert_eq!(args.resync_period(&Config::default()), Duration::ZERO);
    }

    #[test]
    fn test_resync_period_defaults_to_an_hour() {
        let args = parse(&[]);
        assert_eq!(args.resync_period(&Config::default()), DEFAULT_RESYNC_PERIOD);
    }

    #[test]
    fn test_invalid_resync_period_is_rejected() {
        assert!(TestCli::try_parse_from(["sync", "--resync-period", "soon"]).is_err());
    }

    #[test]
    fn test_cluster_config_from_flags() {
        let args = parse(&[
            "--openshift-server",
            "https://master:8443",
            "--openshift-token",
            "sha256~t",
            "--openshift-insecure-skip-tls-verify",
        ]);

        let cluster = args.cluster_config(&Config::default()).unwrap();
        assert_eq!(cluster.server, "https://master:8443");
        assert_eq!(cluster.token.as_deref(), Some("sha256~t"));
        assert!(cluster.insecure_skip_tls_verify);
        assert!(cluster.ca_cert.is_none());
    }

    #[test]
    fn test_dry_run_short_flag() {
        assert!(parse(&["-n"]).dry_run);
    }
}
