//! Batched usage sync.
//!
//! Each webhook attempt is recorded as a [`UsageEvent`]. Events are sent to
//! [`USAGE_SYNC_ENDPOINT`] in one request once `max_batch` events are pending
//! or the oldest pending event is `batch_window_secs` old. The sync runs on a
//! spawned task so recording never waits on the network; at most one sync is
//! in flight. A failed sync keeps the events for the next attempt, capped at
//! `4 * max_batch` (oldest dropped).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use iverton_types::config::UsageSettings;
use iverton_types::error::FetchError;
use iverton_types::usage::UsageEvent;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::webhook::{CallOptions, WebhookGateway, WebhookTransport};

pub const USAGE_SYNC_ENDPOINT: &str = "/usage-sync";

pub struct UsageBatcher<T> {
    shared: Arc<Shared<T>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<T> {
    gateway: Arc<WebhookGateway<T>>,
    settings: UsageSettings,
    clock: Arc<dyn Clock>,
    pending: Mutex<Vec<UsageEvent>>,
}

impl<T: WebhookTransport + 'static> UsageBatcher<T> {
    pub fn new(
        gateway: Arc<WebhookGateway<T>>,
        settings: UsageSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                gateway,
                settings,
                clock,
                pending: Mutex::new(Vec::new()),
            }),
            sync_task: Mutex::new(None),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.shared.lock_pending().len()
    }

    /// Queue an event and start a background sync if the batch is due.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn record(&self, event: UsageEvent) {
        let due = {
            let mut pending = self.shared.lock_pending();
            pending.push(event);
            self.shared.trim(&mut pending);
            self.shared.is_due(&pending)
        };
        if !due {
            return;
        }

        let mut task = lock(&self.sync_task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move {
            // Failures are logged and the events retained.
            let _ = shared.send_pending().await;
        }));
    }

    /// Wait for the background sync, if one is running.
    pub async fn wait_for_sync(&self) {
        let task = lock(&self.sync_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "usage sync task failed");
            }
        }
    }

    /// Sync every pending event now. Returns how many were sent.
    pub async fn flush(&self) -> Result<usize, FetchError> {
        self.wait_for_sync().await;
        self.shared.send_pending().await
    }
}

impl<T: WebhookTransport> Shared<T> {
    async fn send_pending(&self) -> Result<usize, FetchError> {
        let batch: Vec<UsageEvent> = std::mem::take(&mut *self.lock_pending());
        if batch.is_empty() {
            return Ok(0);
        }

        let payload = serde_json::json!({ "events": batch });
        match self
            .gateway
            .call(USAGE_SYNC_ENDPOINT, &payload, CallOptions::default())
            .await
        {
            Ok(Some(_)) => {
                tracing::debug!(events = batch.len(), "usage batch synced");
                Ok(batch.len())
            }
            Ok(None) => {
                tracing::debug!(events = batch.len(), "webhooks disabled, dropping usage batch");
                Ok(0)
            }
            Err(e) => {
                tracing::warn!(events = batch.len(), error = %e, "usage sync failed, keeping batch");
                self.requeue(batch);
                Err(e)
            }
        }
    }

    fn requeue(&self, mut batch: Vec<UsageEvent>) {
        let mut pending = self.lock_pending();
        batch.append(&mut pending);
        self.trim(&mut batch);
        *pending = batch;
    }

    /// Drop the oldest events beyond the backlog cap.
    fn trim(&self, events: &mut Vec<UsageEvent>) {
        let cap = self.settings.max_batch.max(1) * 4;
        if events.len() > cap {
            let excess = events.len() - cap;
            events.drain(..excess);
            tracing::warn!(dropped = excess, "usage backlog full, dropping oldest events");
        }
    }

    fn is_due(&self, pending: &[UsageEvent]) -> bool {
        if pending.len() >= self.settings.max_batch.max(1) {
            return true;
        }
        let window = Duration::seconds(i64::try_from(self.settings.batch_window_secs).unwrap_or(i64::MAX));
        pending
            .first()
            .is_some_and(|oldest| self.clock.now() - oldest.at >= window)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<UsageEvent>> {
        lock(&self.pending)
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> std::fmt::Debug for UsageBatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageBatcher")
            .field("max_batch", &self.shared.settings.max_batch)
            .field("batch_window_secs", &self.shared.settings.batch_window_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::webhook::tests::{FakeTransport, settings};
    use chrono::Utc;
    use iverton_types::usage::UsageOutcome;

    fn event(clock: &ManualClock) -> UsageEvent {
        UsageEvent {
            endpoint: "/seo-ranking".to_string(),
            outcome: UsageOutcome::Live,
            latency_ms: 120,
            at: clock.now(),
        }
    }

    fn batcher(
        status: u16,
        max_batch: usize,
    ) -> (Arc<FakeTransport>, Arc<ManualClock>, UsageBatcher<Arc<FakeTransport>>) {
        let transport = Arc::new(FakeTransport::replying(status, serde_json::json!({"ok": true})));
        let gateway = Arc::new(WebhookGateway::new(Arc::clone(&transport), settings(true)));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let usage = UsageSettings {
            batch_window_secs: 300,
            max_batch,
        };
        let batcher = UsageBatcher::new(gateway, usage, Arc::clone(&clock) as Arc<dyn Clock>);
        (transport, clock, batcher)
    }

    #[tokio::test]
    async fn flushes_when_batch_is_full() {
        let (transport, clock, batcher) = batcher(200, 3);

        batcher.record(event(&clock));
        batcher.record(event(&clock));
        batcher.wait_for_sync().await;
        assert_eq!(transport.calls(), 0);
        assert_eq!(batcher.pending_len(), 2);

        batcher.record(event(&clock));
        batcher.wait_for_sync().await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(batcher.pending_len(), 0);

        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert!(sent.url.ends_with(USAGE_SYNC_ENDPOINT));
        assert_eq!(sent.body["events"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn flushes_when_window_elapses() {
        let (transport, clock, batcher) = batcher(200, 50);

        batcher.record(event(&clock));
        clock.advance(Duration::seconds(301));
        batcher.record(event(&clock));
        batcher.wait_for_sync().await;

        assert_eq!(transport.calls(), 1);
        assert_eq!(batcher.pending_len(), 0);
    }

    #[tokio::test]
    async fn failed_sync_keeps_bounded_backlog() {
        let (transport, clock, batcher) = batcher(500, 2);

        for _ in 0..20 {
            batcher.record(event(&clock));
        }
        assert!(batcher.pending_len() <= 8);
        batcher.wait_for_sync().await;

        assert!(transport.calls() > 0);
        assert!(batcher.pending_len() <= 8);
        assert!(batcher.flush().await.is_err());
        assert!(batcher.pending_len() <= 8);
    }

    #[tokio::test]
    async fn empty_flush_sends_nothing() {
        let (transport, _, batcher) = batcher(200, 5);
        assert_eq!(batcher.flush().await.unwrap(), 0);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn record_does_not_wait_for_a_slow_sync() {
        let mut transport = FakeTransport::replying(200, serde_json::json!({}));
        transport.delay = Some(std::time::Duration::from_secs(20));
        let transport = Arc::new(transport);
        let gateway = Arc::new(WebhookGateway::new(Arc::clone(&transport), settings(true)));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let usage = UsageSettings {
            batch_window_secs: 300,
            max_batch: 1,
        };
        let batcher = UsageBatcher::new(gateway, usage, Arc::clone(&clock) as Arc<dyn Clock>);

        let started = tokio::time::Instant::now();
        batcher.record(event(&clock));
        batcher.record(event(&clock));
        assert_eq!(started.elapsed(), std::time::Duration::ZERO);

        // Both events went out in the background sync.
        assert_eq!(batcher.flush().await.unwrap(), 0);
        assert_eq!(transport.calls(), 1);
        assert_eq!(batcher.pending_len(), 0);
        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.body["events"].as_array().unwrap().len(), 2);
    }
}
