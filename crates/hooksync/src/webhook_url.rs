//! Helpers for OpenShift GitHub webhook URLs.
//!
//! OpenShift mints webhook URLs of the form
//! `<server>/oapi/v1/namespaces/<ns>/buildconfigs/<bc>/webhooks/<secret>/github`.
//! The server part is whatever the API server believes its address is, which
//! is often an internal one, so it gets rewritten to the public URL before the
//! hook is registered on GitHub.

use std::sync::LazyLock;

use regex::Regex;

static WEBHOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"oapi/v1/namespaces/([^/]+)/buildconfigs/([^/]+)/webhooks/([^/]+)/github")
        .expect("valid regex")
});

/// Pieces of a decoded webhook URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub namespace: String,
    pub buildconfig: String,
    pub secret: String,
}

impl WebhookTarget {
    /// Queue key of the owning BuildConfig (`namespace/name`).
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.buildconfig)
    }
}

/// Decode namespace, BuildConfig name and secret from a GitHub webhook URL.
pub fn explode_webhook_url(url: &str) -> Option<WebhookTarget> {
    let caps = WEBHOOK_RE.captures(url)?;
    Some(WebhookTarget {
        namespace: caps[1].to_string(),
        buildconfig: caps[2].to_string(),
        secret: caps[3].to_string(),
    })
}

/// Whether a hook URL targets the OpenShift instance reachable at `public_url`.
pub fn is_our_hook(hook_url: &str, public_url: &str) -> bool {
    hook_url.contains(public_url) && hook_url.ends_with("github")
}

/// Queue key for a hook URL, if it is one of ours and decodes.
pub fn hook_key(hook_url: &str, public_url: &str) -> Option<String> {
    if !is_our_hook(hook_url, public_url) {
        return None;
    }
    explode_webhook_url(hook_url).map(|target| target.key())
}

/// Rewrite the `scheme://authority` prefix of `hook_url` to `public_url`.
///
/// The authority is kept verbatim, so an explicit default port such as
/// `:443` is part of what gets replaced. An empty `public_url` leaves the URL
/// untouched.
pub fn fix_public_url(hook_url: &str, public_url: &str) -> String {
    if public_url.is_empty() {
        return hook_url.to_string();
    }
    match origin(hook_url) {
        Some(origin) => hook_url.replacen(origin, public_url, 1),
        None => hook_url.to_string(),
    }
}

/// The `scheme://authority` prefix of a URL.
fn origin(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&url[..scheme_end + 3 + authority_len])
}
