//! Webhook gateway.
//!
//! POSTs JSON to `{base_url}{endpoint}` through a [`WebhookTransport`] with a
//! bounded wait. When webhooks are disabled every call resolves to `Ok(None)`
//! without touching the transport, which callers treat as "use generated
//! data". There are no retries.

pub mod timeout;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use iverton_types::config::WebhookSettings;
use iverton_types::error::FetchError;
use secrecy::ExposeSecret;
use serde_json::Value;

pub use timeout::resolve_timeout;

/// A fully resolved outbound request.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// Raw response as seen by the transport.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single HTTP POST.
///
/// Implementations return `Err` only for transport-level failures; any HTTP
/// status is reported through `WebhookResponse`.
pub trait WebhookTransport: Send + Sync {
    fn post(
        &self,
        request: WebhookRequest,
    ) -> impl std::future::Future<Output = Result<WebhookResponse, FetchError>> + Send;
}

impl<T: WebhookTransport> WebhookTransport for std::sync::Arc<T> {
    fn post(
        &self,
        request: WebhookRequest,
    ) -> impl std::future::Future<Output = Result<WebhookResponse, FetchError>> + Send {
        T::post(self, request)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Extra headers. They override the defaults on name clash.
    pub headers: BTreeMap<String, String>,
    /// Overrides the configured timeout policy.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            headers: BTreeMap::new(),
            timeout: Some(timeout),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

pub struct WebhookGateway<T> {
    transport: T,
    settings: WebhookSettings,
}

impl<T: WebhookTransport> WebhookGateway<T> {
    pub fn new(transport: T, settings: WebhookSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &WebhookSettings {
        &self.settings
    }

    /// POST `payload` to `endpoint`.
    ///
    /// Returns `Ok(None)` when webhooks are disabled, `Ok(Some(body))` with the
    /// parsed JSON body on a 2xx response (an empty body parses as `null`).
    pub async fn call(
        &self,
        endpoint: &str,
        payload: &Value,
        options: CallOptions,
    ) -> Result<Option<Value>, FetchError> {
        if !self.settings.enabled {
            tracing::debug!(endpoint, "webhooks disabled, skipping call");
            return Ok(None);
        }
        if endpoint.trim().is_empty() {
            return Err(FetchError::InvalidEndpoint);
        }

        let timeout = options.timeout.unwrap_or_else(|| {
            resolve_timeout(
                self.settings.timeout_policy,
                endpoint,
                self.settings.timeout_ms,
            )
        });
        let request = WebhookRequest {
            url: join_url(&self.settings.base_url, endpoint),
            headers: self.headers(options.headers),
            body: payload.clone(),
        };

        let started = Instant::now();
        let response = match tokio::time::timeout(timeout, self.transport.post(request)).await {
            Ok(result) => result?,
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(FetchError::Timeout { timeout_ms });
            }
        };

        tracing::debug!(
            endpoint,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "webhook responded"
        );

        if !response.is_success() {
            return Err(FetchError::RequestFailed {
                status: response.status,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        serde_json::from_str(&response.body)
            .map(Some)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn headers(&self, overrides: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut headers = default_headers();
        if let Some(key) = &self.settings.api_key {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", key.expose_secret()),
            );
        }
        headers.extend(overrides);
        headers
    }
}

impl<T> std::fmt::Debug for WebhookGateway<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookGateway")
            .field("base_url", &self.settings.base_url)
            .field("enabled", &self.settings.enabled)
            .finish()
    }
}

/// Headers sent with every request.
pub fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        (
            "Accept".to_string(),
            "application/json, text/plain, */*".to_string(),
        ),
        (
            "User-Agent".to_string(),
            format!("iverton/{}", env!("CARGO_PKG_VERSION")),
        ),
    ])
}

fn join_url(base: &str, endpoint: &str) -> String {
    match (base.ends_with('/'), endpoint.starts_with('/')) {
        (true, true) => format!("{}{}", base.trim_end_matches('/'), endpoint),
        (false, false) if !base.is_empty() => format!("{base}/{endpoint}"),
        _ => format!("{base}{endpoint}"),
    }
}
