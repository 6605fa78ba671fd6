//! Transport seam for request/response HTTP calls.
//!
//! The GitHub client and public URL discovery go through [`HttpTransport`] so
//! tests can swap in [`MockTransport`]. The OpenShift watch needs a streaming
//! body and talks to reqwest directly.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Header name/value pairs. Lookups through [`header_get`] ignore case.
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// First header value matching `name`, ignoring case.
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Build a reqwest client with an optional request timeout and optional TLS
/// verification bypass.
pub fn build_reqwest_client(
    timeout: Option<Duration>,
    insecure_skip_tls_verify: bool,
) -> Result<reqwest::Client, HttpError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("hooksync/", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(insecure_skip_tls_verify);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| HttpError::Transport(e.to_string()))
}

pub mod reqwest_transport {
    use super::*;

    /// [`HttpTransport`] backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_options(
            timeout: Option<Duration>,
            insecure_skip_tls_verify: bool,
        ) -> Result<Self, HttpError> {
            Ok(Self::new(build_reqwest_client(
                timeout,
                insecure_skip_tls_verify,
            )?))
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let headers: HttpHeaders = resp
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();

            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?
                .to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// In-memory transport for unit tests.
///
/// Responses are registered per method and URL and served in FIFO order.
/// Every request is recorded, including those with no registered response.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, method: HttpMethod, url: impl Into<String>, response: HttpResponse) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    /// Register a JSON body with the given status.
    pub fn push_json(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        status: u16,
        body: serde_json::Value,
    ) {
        self.push_response(
            method,
            url,
            HttpResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.to_string().into_bytes(),
            },
        );
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }

    /// Recorded requests with the given method.
    #[must_use]
    pub fn requests_with(&self, method: HttpMethod) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(resp) => Ok(resp),
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_get_ignores_case_and_returns_first() {
        let headers: HttpHeaders = vec![
            ("Link".to_string(), "<a>; rel=\"next\"".to_string()),
            ("link".to_string(), "<b>; rel=\"next\"".to_string()),
        ];
        assert_eq!(header_get(&headers, "LINK"), Some("<a>; rel=\"next\""));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn test_response_helpers() {
        let resp = HttpResponse {
            status: 204,
            headers: vec![("X-RateLimit-Remaining".to_string(), "0".to_string())],
            body: b"  done \n".to_vec(),
        };
        assert!(resp.is_success());
        assert_eq!(resp.header("x-ratelimit-remaining"), Some("0"));
        assert_eq!(resp.text(), "done");

        let failed = HttpResponse {
            status: 422,
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert!(!failed.is_success());
    }

    #[tokio::test]
    async fn test_mock_transport_serves_fifo_and_records() {
        let transport = MockTransport::new();
        let url = "https://api.github.test/repos/o/n/hooks";
        transport.push_json(HttpMethod::Get, url, 200, serde_json::json!([]));
        transport.push_json(HttpMethod::Get, url, 500, serde_json::json!({"message": "boom"}));

        let req = HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert_eq!(transport.send(req.clone()).await.unwrap().status, 200);
        assert_eq!(transport.send(req.clone()).await.unwrap().status, 500);

        let err = transport.send(req.clone()).await.unwrap_err();
        match err {
            HttpError::NoMockResponse { method, url: missing } => {
                assert_eq!(method, "GET");
                assert_eq!(missing, url);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(transport.requests().len(), 3);
        assert!(transport.requests_with(HttpMethod::Post).is_empty());
    }

    #[test]
    fn test_build_reqwest_client_with_insecure_tls() {
        build_reqwest_client(Some(Duration::from_secs(1)), true).expect("client should build");
        reqwest_transport::ReqwestTransport::with_options(None, false)
            .expect("transport should build");
    }

    #[tokio::test]
    async fn test_reqwest_transport_reports_invalid_url() {
        let transport = reqwest_transport::ReqwestTransport::new(reqwest::Client::new());
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "not a url".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let err = transport.send(req).await.expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
