//! Widget data service: webhook first, generated data as fallback.

use std::sync::Arc;
use std::time::Instant;

use iverton_types::error::{FetchError, Severity};
use iverton_types::payload::{DataCategory, FetchParams, WidgetContent};
use iverton_types::usage::{UsageEvent, UsageOutcome};
use iverton_types::widget::WidgetId;

use super::grid::WidgetGridStore;
use crate::automation::AutomationSource;
use crate::clock::Clock;
use crate::generator::DataGenerator;
use crate::usage::UsageBatcher;
use crate::webhook::{CallOptions, WebhookGateway, WebhookTransport};

pub struct WidgetDataService<T> {
    gateway: Arc<WebhookGateway<T>>,
    generator: DataGenerator,
    clock: Arc<dyn Clock>,
    usage: Option<Arc<UsageBatcher<T>>>,
}

impl<T: WebhookTransport + 'static> WidgetDataService<T> {
    pub fn new(
        gateway: Arc<WebhookGateway<T>>,
        generator: DataGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            generator,
            clock,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Arc<UsageBatcher<T>>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Fetch display data for `category`. Never fails.
    ///
    /// A disabled gateway, a failed call or an empty body all fall back to
    /// generated data. A body that does not match the category's shape is
    /// kept as `WidgetContent::Unknown`.
    pub async fn fetch(&self, category: DataCategory, params: &FetchParams) -> WidgetContent {
        let endpoint = category.endpoint();
        let payload = request_body(params);

        let started = Instant::now();
        let result = self
            .gateway
            .call(&endpoint, &payload, CallOptions::default())
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let outcome = match &result {
            Ok(Some(_)) => UsageOutcome::Live,
            Ok(None) => UsageOutcome::Disabled,
            Err(_) => UsageOutcome::Failed,
        };
        self.record_usage(&endpoint, outcome, latency_ms);

        match result {
            Ok(Some(body)) if !body.is_null() => WidgetContent::from_response(category, body),
            Ok(_) => self.generator.generate(category, params),
            Err(e) => {
                log_fallback(&endpoint, &e);
                self.generator.generate(category, params)
            }
        }
    }

    /// Fetch data for a grid widget and store it on the widget.
    ///
    /// Returns `false` when the widget has no data category or was removed
    /// while the fetch was in flight.
    pub async fn load_widget(
        &self,
        grid: &WidgetGridStore,
        id: WidgetId,
        params: &FetchParams,
    ) -> bool {
        let Some(category) = grid.get(id).and_then(|w| w.kind.category()) else {
            return false;
        };
        let content = self.fetch(category, params).await;
        let stored = grid.set_content(id, content);
        if !stored {
            tracing::debug!(widget_id = %id, "widget removed before its data arrived");
        }
        stored
    }

    fn record_usage(&self, endpoint: &str, outcome: UsageOutcome, latency_ms: u64) {
        if let Some(usage) = &self.usage {
            usage.record(UsageEvent {
                endpoint: endpoint.to_string(),
                outcome,
                latency_ms,
                at: self.clock.now(),
            });
        }
    }
}

impl<T: WebhookTransport + 'static> AutomationSource for WidgetDataService<T> {
    async fn fetch(
        &self,
        category: DataCategory,
        params: &FetchParams,
    ) -> Result<WidgetContent, FetchError> {
        Ok(WidgetDataService::fetch(self, category, params).await)
    }
}

impl<T> std::fmt::Debug for WidgetDataService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetDataService")
            .field("gateway", &self.gateway)
            .field("usage", &self.usage.is_some())
            .finish()
    }
}

/// Webhook body: `{website_url, time_duration, keywords}`.
fn request_body(params: &FetchParams) -> serde_json::Value {
    serde_json::json!({
        "website_url": params.website_url,
        "time_duration": params.time_duration,
        "keywords": params.keywords,
    })
}

fn log_fallback(endpoint: &str, error: &FetchError) {
    match error.severity() {
        Severity::High => {
            tracing::warn!(endpoint, error = %error, "webhook failed, using generated data")
        }
        Severity::Medium | Severity::Low => {
            tracing::info!(endpoint, error = %error, "webhook failed, using generated data")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryKvStore;
    use crate::webhook::tests::{FakeTransport, settings};
    use crate::webhook::{WebhookRequest, WebhookResponse};
    use iverton_types::config::UsageSettings;
    use iverton_types::widget::WidgetKind;
    use std::time::Duration;

    /// Answers data endpoints at once and never answers the usage sync.
    struct StalledUsageSync;

    impl WebhookTransport for StalledUsageSync {
        async fn post(&self, request: WebhookRequest) -> Result<WebhookResponse, FetchError> {
            if request.url.ends_with(crate::usage::USAGE_SYNC_ENDPOINT) {
                std::future::pending::<()>().await;
            }
            Ok(WebhookResponse {
                status: 200,
                body: serde_json::json!({"target_url": "https://live.example"}).to_string(),
            })
        }
    }

    fn service(status: u16, body: serde_json::Value, enabled: bool) -> (Arc<FakeTransport>, WidgetDataService<Arc<FakeTransport>>) {
        let transport = Arc::new(FakeTransport::replying(status, body));
        let gateway = Arc::new(WebhookGateway::new(Arc::clone(&transport), settings(enabled)));
        (
            transport,
            WidgetDataService::new(gateway, DataGenerator::seeded(11), Arc::new(ManualClock::default())),
        )
    }

    #[tokio::test]
    async fn disabled_webhooks_fall_back_to_generated_payload() {
        let (transport, service) = service(200, serde_json::json!({}), false);
        let params = FetchParams::for_site("https://example.com", "last 30 days");

        let content = service.fetch(DataCategory::SeoRanking, &params).await;

        assert_eq!(content.category(), Some(DataCategory::SeoRanking));
        assert_eq!(content.target_url(), Some("https://example.com"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn live_response_is_decoded_into_typed_payload() {
        let body = serde_json::json!({
            "target_url": "https://live.example",
            "hashtags": [
                {"tag": "#seo", "posts": 10, "engagement_rate": 1.5, "trend": "rising"}
            ]
        });
        let (transport, service) = service(200, body, true);

        let content = service
            .fetch(DataCategory::Hashtags, &FetchParams::for_site("https://live.example", "last 7 days"))
            .await;

        assert_eq!(transport.calls(), 1);
        match content {
            WidgetContent::Hashtags(data) => assert_eq!(data.hashtags.len(), 1),
            other => panic!("unexpected payload: {other:?}"),
        }
        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.body["website_url"], "https://live.example");
        assert_eq!(sent.body["time_duration"], "last 7 days");
    }

    #[tokio::test]
    async fn foreign_shape_is_kept_as_unknown() {
        let (_, service) = service(200, serde_json::json!({"rows": [1, 2]}), true);
        let content = service.fetch(DataCategory::Backlinks, &FetchParams::default()).await;
        assert_eq!(content, WidgetContent::Unknown(serde_json::json!({"rows": [1, 2]})));
    }

    #[tokio::test]
    async fn failed_call_falls_back() {
        let (transport, service) = service(502, serde_json::json!({}), true);
        let content = service
            .fetch(DataCategory::TrafficOverview, &FetchParams::for_site("https://x.io", "last 7 days"))
            .await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(content.category(), Some(DataCategory::TrafficOverview));
        assert_eq!(content.target_url(), Some("https://x.io"));
    }

    #[tokio::test]
    async fn load_widget_skips_removed_and_dataless_widgets() {
        let (_, service) = service(200, serde_json::json!({}), false);
        let grid = WidgetGridStore::open(Arc::new(MemoryKvStore::new())).await;
        let params = FetchParams::default();

        let seo = grid.add_widget(WidgetKind::SeoRanking, None);
        let notes = grid.add_widget(WidgetKind::Notes, None);

        assert!(service.load_widget(&grid, seo, &params).await);
        assert!(grid.get(seo).unwrap().content.is_some());
        assert!(!service.load_widget(&grid, notes, &params).await);
        assert!(!service.load_widget(&grid, WidgetId::new(), &params).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_usage_sync_does_not_delay_widget_data() {
        let gateway = Arc::new(WebhookGateway::new(StalledUsageSync, settings(true)));
        let clock = Arc::new(ManualClock::default());
        let usage = Arc::new(UsageBatcher::new(
            Arc::clone(&gateway),
            UsageSettings {
                batch_window_secs: 300,
                max_batch: 1,
            },
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let service = WidgetDataService::new(gateway, DataGenerator::seeded(3), clock)
            .with_usage(Arc::clone(&usage));

        for _ in 0..3 {
            let started = tokio::time::Instant::now();
            let content = service
                .fetch(DataCategory::SeoRanking, &FetchParams::default())
                .await;
            assert_eq!(started.elapsed(), Duration::ZERO);
            assert_eq!(content.target_url(), Some("https://live.example"));
        }

        // The stalled sync times out and keeps its events.
        assert!(usage.flush().await.is_err());
        assert!(usage.pending_len() >= 1);
    }

    #[tokio::test]
    async fn usage_events_use_the_injected_clock() {
        let transport = Arc::new(FakeTransport::replying(200, serde_json::json!({})));
        let gateway = Arc::new(WebhookGateway::new(Arc::clone(&transport), settings(true)));
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        ));
        let usage = Arc::new(UsageBatcher::new(
            Arc::clone(&gateway),
            UsageSettings {
                batch_window_secs: 300,
                max_batch: 1,
            },
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let service = WidgetDataService::new(gateway, DataGenerator::seeded(4), Arc::clone(&clock) as Arc<dyn Clock>)
            .with_usage(Arc::clone(&usage));

        service.fetch(DataCategory::Backlinks, &FetchParams::default()).await;
        usage.wait_for_sync().await;

        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert!(sent.url.ends_with(crate::usage::USAGE_SYNC_ENDPOINT));
        assert_eq!(
            sent.body["events"][0]["at"],
            serde_json::to_value(clock.now()).unwrap()
        );
    }
}
