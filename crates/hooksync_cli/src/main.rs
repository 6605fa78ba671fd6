//! hooksync CLI - keeps GitHub webhooks in sync with OpenShift BuildConfigs.

mod commands;
mod config;
mod shutdown;

use clap::{Parser, Subcommand};
use hooksync::controller::{DELTA_LOG_TARGET, REJECTION_LOG_TARGET};
use tracing_subscriber::EnvFilter;

use crate::commands::list::ListArgs;
use crate::commands::sync::SyncArgs;

#[derive(Parser)]
#[command(name = "hooksync")]
#[command(version)]
#[command(about = "Keep GitHub webhooks in sync with OpenShift BuildConfigs")]
#[command(
    long_about = "hooksync watches the BuildConfigs of an OpenShift cluster and registers a \
GitHub webhook for every BuildConfig that builds from a GitHub repository and has a GitHub \
trigger. Hooks of deleted BuildConfigs are removed from GitHub."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = r#"EXAMPLES
    Sync the hooks of an organization, from inside the cluster:
        $ hooksync sync --organization acme

    See what would change without touching GitHub:
        $ hooksync sync --organization acme --dry-run -v 2

    List the hooks we manage in a single repository:
        $ hooksync list --organization acme --repository frontend

CONFIGURATION
    hooksync reads configuration from:
      1. ~/.config/hooksync/config.toml (or $XDG_CONFIG_HOME/hooksync/config.toml)
      2. ./hooksync.toml
      3. Environment variables (HOOKSYNC_ prefix, e.g., HOOKSYNC_GITHUB__ORGANIZATION)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GITHUB_ACCESS_TOKEN       GitHub access token
    GITHUB_ORGANIZATION       GitHub organization to sync
    OPENSHIFT_SERVER          OpenShift API server URL
    OPENSHIFT_TOKEN           OpenShift bearer token
    RUST_LOG                  Log filter, overrides -v
"#)]
struct Cli {
    /// Log verbosity: 1 actions taken, 2 intent, 3 per-change handling, 4 reasons
    /// BuildConfigs are skipped, 5 everything
    #[arg(short, long, global = true, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=5))]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch BuildConfigs and keep GitHub webhooks in sync
    Sync(SyncArgs),
    /// List the GitHub webhooks that point at OpenShift
    List(ListArgs),
}

fn log_filter(verbose: u8) -> EnvFilter {
    let directives = match verbose {
        0 => "warn".to_string(),
        1 => "warn,hooksync=info,hooksync_cli=info".to_string(),
        2 => format!(
            "warn,hooksync=debug,hooksync_cli=debug,{DELTA_LOG_TARGET}=info,{REJECTION_LOG_TARGET}=info"
        ),
        3 => "warn,hooksync=debug,hooksync_cli=debug".to_string(),
        4 => format!("warn,hooksync=debug,hooksync_cli=debug,{REJECTION_LOG_TARGET}=trace"),
        _ => "warn,hooksync=trace,hooksync_cli=trace".to_string(),
    };
    EnvFilter::new(directives)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(cli.verbose));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    match cli.command {
        Commands::Sync(args) => commands::sync::handle_sync(args, &config).await?,
        Commands::List(args) => commands::list::handle_list(args, &config).await?,
    }

    Ok(())
}
