//! `reqwest` implementation of `WebhookTransport`.
//!
//! The gateway owns the timeout (it wraps every call in
//! `tokio::time::timeout`), so the client here only bounds connection setup.
//! Any HTTP status is returned as a response; only I/O failures become
//! `FetchError::Transport`.

use std::time::Duration;

use iverton_core::webhook::{WebhookRequest, WebhookResponse, WebhookTransport};
use iverton_types::error::FetchError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Connection establishment limit, independent of the per-call timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared connection pool, proxies, test servers).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl WebhookTransport for ReqwestTransport {
    async fn post(&self, request: WebhookRequest) -> Result<WebhookResponse, FetchError> {
        let headers = header_map(&request)?;

        let response = self
            .client
            .post(&request.url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read response body: {e}")))?;

        Ok(WebhookResponse { status, body })
    }
}

/// Convert the request's header map, rejecting names or values HTTP cannot carry.
fn header_map(request: &WebhookRequest) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::Transport(format!("invalid header name '{name}'")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::Transport(format!("invalid value for header '{name}'")))?;
        if name == reqwest::header::AUTHORIZATION {
            value.set_sensitive(true);
        }
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(headers: BTreeMap<String, String>) -> WebhookRequest {
        WebhookRequest {
            url: "http://127.0.0.1:9/webhook/seo-ranking".to_string(),
            headers,
            body: serde_json::json!({"website_url": "https://example.com"}),
        }
    }

    #[test]
    fn test_header_map_converts_gateway_headers() {
        let mut headers = iverton_core::webhook::default_headers();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());

        let map = header_map(&request(headers)).unwrap();
        assert_eq!(map.get("content-type").unwrap(), "application/json");
        assert!(map.get("authorization").unwrap().is_sensitive());
        assert!(map.get("user-agent").unwrap().to_str().unwrap().starts_with("iverton/"));
    }

    #[test]
    fn test_header_map_rejects_invalid_value() {
        let headers = BTreeMap::from([("X-Trace".to_string(), "line\nbreak".to_string())]);
        let err = header_map(&request(headers)).unwrap_err();
        assert!(matches!(err, FetchError::Transport(msg) if msg.contains("X-Trace") || msg.contains("x-trace")));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport.post(request(BTreeMap::new())).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
