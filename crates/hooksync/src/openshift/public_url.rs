//! Discovery of the public URL of the OpenShift master.

use serde::Deserialize;

use crate::http::{HttpMethod, HttpRequest, HttpTransport};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDeclaration {
    #[serde(default)]
    base_path: String,
}

/// Ask the master for its public URL.
///
/// The swagger declaration at `<server>/swaggerapi/api/v1` carries the
/// public URL as `basePath`. Any failure falls back to `server`; an empty
/// `server` yields an empty string. The transport should skip TLS
/// verification since the master may present a certificate for its public
/// name only.
pub async fn discover_public_url(transport: &dyn HttpTransport, server: &str) -> String {
    if server.is_empty() {
        return String::new();
    }
    let server = server.trim_end_matches('/');

    let request = HttpRequest {
        method: HttpMethod::Get,
        url: format!("{server}/swaggerapi/api/v1"),
        headers: vec![("Accept".to_string(), "application/json".to_string())],
        body: Vec::new(),
    };

    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to request the swagger API");
            return server.to_string();
        }
    };
    if !response.is_success() {
        tracing::warn!(status = response.status, "Swagger API returned an error");
        return server.to_string();
    }

    match serde_json::from_slice::<ApiDeclaration>(&response.body) {
        Ok(declaration) => {
            tracing::debug!(public_url = %declaration.base_path, "Discovered OpenShift public URL");
            declaration.base_path
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode the swagger API response");
            server.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport};

    const SWAGGER: &str = "https://10.0.0.1:443/swaggerapi/api/v1";

    #[tokio::test]
    async fn test_discover_uses_base_path() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            SWAGGER,
            200,
            serde_json::json!({"swaggerVersion": "1.2", "basePath": "https://master.example.com:8443"}),
        );

        let url = discover_public_url(&transport, "https://10.0.0.1:443/").await;
        assert_eq!(url, "https://master.example.com:8443");
    }

    #[tokio::test]
    async fn test_discover_falls_back_to_server() {
        let transport = MockTransport::new();
        // unreachable: no response registered
        assert_eq!(
            discover_public_url(&transport, "https://10.0.0.1:443").await,
            "https://10.0.0.1:443"
        );

        transport.push_response(
            HttpMethod::Get,
            SWAGGER,
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<html>".to_vec(),
            },
        );
        assert_eq!(
            discover_public_url(&transport, "https://10.0.0.1:443").await,
            "https://10.0.0.1:443"
        );

        transport.push_json(HttpMethod::Get, SWAGGER, 403, serde_json::json!({}));
        assert_eq!(
            discover_public_url(&transport, "https://10.0.0.1:443").await,
            "https://10.0.0.1:443"
        );
    }

    #[tokio::test]
    async fn test_discover_without_server() {
        let transport = MockTransport::new();
        assert_eq!(discover_public_url(&transport, "").await, "");
        assert!(transport.requests().is_empty());
    }
}
