use hooksync::github::DEFAULT_LIST_CONCURRENCY;
use hooksync::listing::{WebhookRow, list_webhooks};
use tabled::Tabled;
use tabled::settings::{Padding, Style};

use crate::commands::shared::{GitHubArgs, resolve_public_url, resolve_server};
use crate::config::Config;

/// Options of `hooksync list`.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ListArgs {
    #[command(flatten)]
    pub(crate) github: GitHubArgs,

    /// Only list the hooks of this repository of the organization
    #[arg(long)]
    pub(crate) repository: Option<String>,

    /// OpenShift API server URL, used to discover the public URL
    #[arg(long, env = "OPENSHIFT_SERVER")]
    pub(crate) openshift_server: Option<String>,

    /// Public URL of the OpenShift master the hooks point at [default: discovered]
    #[arg(long)]
    pub(crate) openshift_public_url: Option<String>,
}

/// One line of the `list` output.
#[derive(Debug, Clone, Tabled)]
struct WebhookLine {
    #[tabled(rename = "OWNER")]
    owner: String,
    #[tabled(rename = "REPOSITORY")]
    repository: String,
    #[tabled(rename = "NAMESPACE")]
    namespace: String,
    #[tabled(rename = "BUILDCONFIG")]
    buildconfig: String,
    #[tabled(rename = "WEBHOOK SECRET")]
    secret: String,
}

impl From<WebhookRow> for WebhookLine {
    fn from(row: WebhookRow) -> Self {
        Self {
            owner: row.owner,
            repository: row.repository,
            namespace: row.namespace,
            buildconfig: row.buildconfig,
            secret: row.secret,
        }
    }
}

fn render(rows: Vec<WebhookRow>) -> String {
    let lines: Vec<WebhookLine> = rows.into_iter().map(WebhookLine::from).collect();
    let mut table = tabled::Table::new(lines);
    table.with(Style::blank()).with(Padding::new(0, 3, 0, 0));
    table.to_string()
}

/// Print the hooks pointing at OpenShift.
pub(crate) async fn handle_list(
    args: ListArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let github = args.github.resolve(config)?;
    let server = resolve_server(args.openshift_server, config);
    let public_url = resolve_public_url(args.openshift_public_url, config, server.as_deref()).await;

    let manager = github.manager(DEFAULT_LIST_CONCURRENCY)?;
    let rows = list_webhooks(
        &manager,
        &github.organization,
        args.repository.as_deref().filter(|r| !r.is_empty()),
        &public_url,
    )
    .await?;

    tracing::debug!(count = rows.len(), "Listed webhooks");
    println!("{}", render(rows));
    Ok(())
}
