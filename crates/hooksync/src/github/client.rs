//! GitHub REST client for repository hooks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::error::GitHubError;
use super::pagination::parse_link_header;
use super::types::{NewHook, PER_PAGE, RemoteHook, RemoteRepository};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Public GitHub API endpoint.
pub const DEFAULT_GITHUB_BASE_URL: &str = "https://api.github.com/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin GitHub client over an [`HttpTransport`].
///
/// Errors are surfaced unchanged; retrying is left to callers.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: String,
}

impl GitHubClient {
    /// Create a client for `base_url` (github.com or a GitHub Enterprise API
    /// root) authenticating with `token`.
    pub fn new(
        base_url: &str,
        token: &str,
        insecure_skip_tls_verify: bool,
    ) -> Result<Self, GitHubError> {
        if token.is_empty() {
            return Err(GitHubError::Config("empty GitHub access token".to_string()));
        }
        let transport =
            ReqwestTransport::with_options(Some(REQUEST_TIMEOUT), insecure_skip_tls_verify)
                .map_err(|e| GitHubError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(base_url, token, Arc::new(transport)))
    }

    pub fn new_with_transport(
        base_url: &str,
        token: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// All hooks of a repository, following pagination to the end.
    pub async fn list_hooks(&self, owner: &str, name: &str) -> Result<Vec<RemoteHook>, GitHubError> {
        let hooks: Vec<RemoteHook> = self
            .get_all_pages(|page| {
                format!("/repos/{owner}/{name}/hooks?per_page={PER_PAGE}&page={page}")
            })
            .await?;
        tracing::trace!(repository = %format!("{owner}/{name}"), count = hooks.len(), "Listed hooks");
        Ok(hooks)
    }

    /// All repositories of an organization, of every type.
    pub async fn list_org_repos(&self, org: &str) -> Result<Vec<RemoteRepository>, GitHubError> {
        let repos: Vec<RemoteRepository> = self
            .get_all_pages(|page| {
                format!("/orgs/{org}/repos?type=all&per_page={PER_PAGE}&page={page}")
            })
            .await?;
        tracing::trace!(org, count = repos.len(), "Listed organization repositories");
        Ok(repos)
    }

    pub async fn get_repo(&self, owner: &str, name: &str) -> Result<RemoteRepository, GitHubError> {
        let response = self
            .send(HttpMethod::Get, &format!("/repos/{owner}/{name}"), None)
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn create_hook(
        &self,
        owner: &str,
        name: &str,
        hook: &NewHook,
    ) -> Result<RemoteHook, GitHubError> {
        let body = serde_json::to_vec(hook)?;
        let response = self
            .send(HttpMethod::Post, &format!("/repos/{owner}/{name}/hooks"), Some(body))
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn delete_hook(&self, owner: &str, name: &str, id: u64) -> Result<(), GitHubError> {
        self.send(HttpMethod::Delete, &format!("/repos/{owner}/{name}/hooks/{id}"), None)
            .await?;
        Ok(())
    }

    /// Fetch pages starting at 1 until the `Link` header stops advertising a
    /// next page.
    async fn get_all_pages<T, F>(&self, route: F) -> Result<Vec<T>, GitHubError>
    where
        T: DeserializeOwned,
        F: Fn(u32) -> String,
    {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let response = self.send(HttpMethod::Get, &route(page), None).await?;
            let batch: Vec<T> = serde_json::from_slice(&response.body)?;
            items.extend(batch);

            let next = response
                .header("link")
                .and_then(|h| parse_link_header(h).next_page)
                .unwrap_or(0);
            if next == 0 {
                break;
            }
            page = next;
        }
        Ok(items)
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, GitHubError> {
        let mut headers = vec![
            ("Accept".to_string(), "application/vnd.github+json".to_string()),
            ("User-Agent".to_string(), "hooksync".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", self.token)),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body: body.unwrap_or_default(),
        };

        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        Err(error_from_response(path, &response))
    }
}

fn error_from_response(path: &str, response: &HttpResponse) -> GitHubError {
    if matches!(response.status, 403 | 429) && response.header("x-ratelimit-remaining") == Some("0")
    {
        let reset_at = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .unwrap_or_else(Utc::now);
        return GitHubError::RateLimited { reset_at };
    }

    if response.status == 404 {
        return GitHubError::NotFound(path.to_string());
    }

    let message = serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| response.text());
    GitHubError::Api {
        status: response.status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use serde_json::json;

    const BASE: &str = "https://github.example.com/api/v3";

    fn client(transport: &MockTransport) -> GitHubClient {
        GitHubClient::new_with_transport(
            &format!("{BASE}/"),
            "secret-token",
            Arc::new(transport.clone()),
        )
    }

    fn json_response(status: u16, body: serde_json::Value, link: Option<&str>) -> HttpResponse {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(link) = link {
            headers.push(("Link".to_string(), link.to_string()));
        }
        HttpResponse {
            status,
            headers,
            body: body.to_string().into_bytes(),
        }
    }

    #[tokio::test]
    async fn test_list_hooks_follows_link_pagination() {
        let transport = MockTransport::new();
        let page1 = format!("{BASE}/repos/o/n/hooks?per_page=100&page=1");
        let page2 = format!("{BASE}/repos/o/n/hooks?per_page=100&page=2");
        transport.push_response(
            HttpMethod::Get,
            &page1,
            json_response(
                200,
                json!([{"id": 1, "config": {"url": "https://a/github"}}]),
                Some(&format!("<{page2}>; rel=\"next\", <{page2}>; rel=\"last\"")),
            ),
        );
        transport.push_response(
            HttpMethod::Get,
            &page2,
            json_response(
                200,
                json!([{"id": 2, "config": {"url": "https://b/github"}}]),
                Some(&format!("<{page1}>; rel=\"prev\", <{page1}>; rel=\"first\"")),
            ),
        );

        let hooks = client(&transport).list_hooks("o", "n").await.unwrap();
        assert_eq!(hooks.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(
            requests[0]
                .headers
                .contains(&("Authorization".to_string(), "Bearer secret-token".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_hooks_aborts_on_page_failure() {
        let transport = MockTransport::new();
        let page1 = format!("{BASE}/repos/o/n/hooks?per_page=100&page=1");
        let page2 = format!("{BASE}/repos/o/n/hooks?per_page=100&page=2");
        transport.push_response(
            HttpMethod::Get,
            &page1,
            json_response(200, json!([{"id": 1}]), Some(&format!("<{page2}>; rel=\"next\""))),
        );
        transport.push_response(
            HttpMethod::Get,
            &page2,
            json_response(500, json!({"message": "Server Error"}), None),
        );

        let err = client(&transport).list_hooks("o", "n").await.unwrap_err();
        match err {
            GitHubError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_org_repos_requests_all_types() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/orgs/acme/repos?type=all&per_page=100&page=1"),
            200,
            json!([
                {"id": 10, "name": "api", "full_name": "acme/api", "owner": {"login": "acme"}},
                {"id": 11, "name": "web", "full_name": "acme/web", "owner": {"login": "acme"}}
            ]),
        );

        let repos = client(&transport).list_org_repos("acme").await.unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["api", "web"]);
    }

    #[tokio::test]
    async fn test_create_hook_posts_payload() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/repos/o/n/hooks"),
            201,
            json!({"id": 7, "name": "web", "active": true, "events": ["*"], "config": {"url": "https://p/github"}}),
        );

        let created = client(&transport)
            .create_hook("o", "n", &NewHook::web("https://p/github"))
            .await
            .unwrap();
        assert_eq!(created.id, 7);

        let posts = transport.requests_with(HttpMethod::Post);
        assert_eq!(posts.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&posts[0].body).unwrap();
        assert_eq!(body["config"]["url"], "https://p/github");
        assert_eq!(body["config"]["insecure_ssl"], "true");
    }

    #[tokio::test]
    async fn test_delete_hook_accepts_no_content() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Delete,
            format!("{BASE}/repos/o/n/hooks/7"),
            HttpResponse {
                status: 204,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        client(&transport).delete_hook("o", "n", 7).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_repo_not_found() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/repos/o/missing"),
            404,
            json!({"message": "Not Found"}),
        );

        let err = client(&transport).get_repo("o", "missing").await.unwrap_err();
        assert!(matches!(err, GitHubError::NotFound(path) if path == "/repos/o/missing"));
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{BASE}/repos/o/n"),
            HttpResponse {
                status: 403,
                headers: vec![
                    ("X-RateLimit-Remaining".to_string(), "0".to_string()),
                    ("X-RateLimit-Reset".to_string(), "1700000000".to_string()),
                ],
                body: br#"{"message": "API rate limit exceeded"}"#.to_vec(),
            },
        );

        let err = client(&transport).get_repo("o", "n").await.unwrap_err();
        match err {
            GitHubError::RateLimited { reset_at } => assert_eq!(reset_at.timestamp(), 1_700_000_000),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_empty_token() {
        let err = GitHubClient::new(DEFAULT_GITHUB_BASE_URL, "", false)
            .err()
            .expect("empty token should fail");
        assert!(matches!(err, GitHubError::Config(_)));
    }
}
