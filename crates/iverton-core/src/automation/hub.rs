//! Automation hub store.
//!
//! One [`AutomationResult`] per registered automation id. Results move
//! `stale -> loading -> fresh | error` on refresh; `fresh -> stale` happens
//! lazily when a read finds the refresh interval elapsed.
//!
//! Refreshes are guarded per id: a refresh requested while another one for
//! the same id is in flight is skipped. When a fetch completes for an id that
//! was removed meanwhile, the result is dropped. A refresh whose future is
//! dropped before the fetch completes leaves its result `stale`.

use std::sync::Arc;

use dashmap::DashSet;
use futures_util::future::join_all;
use iverton_types::automation::{AutomationResult, AutomationStatus};
use iverton_types::config::AutomationSettings;
use iverton_types::payload::{DataCategory, FetchParams, WidgetContent};
use iverton_types::storage::AUTOMATION_HUB_STORAGE;
use serde::{Deserialize, Serialize};

use super::AutomationSource;
use crate::clock::Clock;
use crate::storage::KvBacking;
use crate::store::{PersistOptions, PersistedState, PersistedStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubState {
    #[serde(default)]
    pub results: Vec<AutomationResult>,
    /// Parameters sent with every refresh.
    #[serde(default)]
    pub params: FetchParams,
}

impl HubState {
    fn with_defaults(refresh_interval: u32) -> Self {
        Self {
            results: DataCategory::ALL
                .into_iter()
                .map(|category| AutomationResult::new(category.as_str(), category, refresh_interval))
                .collect(),
            params: FetchParams::default(),
        }
    }

    fn find(&self, id: &str) -> Option<&AutomationResult> {
        self.results.iter().find(|r| r.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut AutomationResult> {
        self.results.iter_mut().find(|r| r.id == id)
    }
}

impl PersistedState for HubState {}

/// How a refresh request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Fresh,
    Failed(String),
    /// No automation with this id.
    UnknownId,
    /// A refresh for this id was already running.
    InFlight,
    /// The automation was removed while its data was being fetched.
    Removed,
}

/// Holds an id in the in-flight set for the duration of a refresh.
///
/// Dropped before [`settle`](Self::settle) (the refresh future was cancelled),
/// it puts a `Loading` result back to `Stale` so the next sweep retries it.
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    store: &'a PersistedStore<HubState>,
    id: String,
    settled: bool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(
        set: &'a DashSet<String>,
        store: &'a PersistedStore<HubState>,
        id: &str,
    ) -> Option<Self> {
        set.insert(id.to_string()).then(|| Self {
            set,
            store,
            id: id.to_string(),
            settled: false,
        })
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let reset = self.store.update(|s| {
                let result = s.find_mut(&self.id)?;
                (result.status == AutomationStatus::Loading).then(|| {
                    result.status = AutomationStatus::Stale;
                })
            });
            if reset.is_some() {
                tracing::debug!(automation = %self.id, "refresh cancelled, result reset to stale");
            }
        }
        self.set.remove(&self.id);
    }
}

pub struct AutomationHub<Src> {
    inner: PersistedStore<HubState>,
    source: Src,
    clock: Arc<dyn Clock>,
    in_flight: DashSet<String>,
}

impl<Src: AutomationSource> AutomationHub<Src> {
    pub async fn open<B: KvBacking + 'static>(
        backing: Arc<B>,
        source: Src,
        clock: Arc<dyn Clock>,
        settings: &AutomationSettings,
    ) -> Self {
        let inner = PersistedStore::open(
            backing,
            PersistOptions::new(AUTOMATION_HUB_STORAGE),
            HubState::with_defaults(settings.default_refresh_interval_minutes),
        )
        .await;

        // A refresh cannot survive a restart.
        inner.update(|s| {
            let mut reset = false;
            for result in &mut s.results {
                if result.status == AutomationStatus::Loading {
                    result.status = AutomationStatus::Stale;
                    reset = true;
                }
            }
            reset.then_some(())
        });

        Self {
            inner,
            source,
            clock,
            in_flight: DashSet::new(),
        }
    }

    pub fn results(&self) -> Vec<AutomationResult> {
        self.inner.get_state().results.clone()
    }

    pub fn get(&self, id: &str) -> Option<AutomationResult> {
        self.inner.get_state().find(id).cloned()
    }

    pub fn params(&self) -> FetchParams {
        self.inner.get_state().params.clone()
    }

    /// Refresh one automation from the source.
    pub async fn refresh(&self, id: &str) -> RefreshOutcome {
        let Some(kind) = self.inner.get_state().find(id).map(|r| r.kind) else {
            return RefreshOutcome::UnknownId;
        };
        let Some(mut guard) = InFlightGuard::acquire(&self.in_flight, &self.inner, id) else {
            tracing::debug!(automation = id, "refresh already in flight");
            return RefreshOutcome::InFlight;
        };

        let began = self.inner.update(|s| {
            let result = s.find_mut(id)?;
            result.status = AutomationStatus::Loading;
            Some(())
        });
        if began.is_none() {
            return RefreshOutcome::UnknownId;
        }

        let params = self.params();
        let fetched = self.source.fetch(kind, &params).await;
        let now = self.clock.now();

        let outcome = self.inner.update(|s| {
            let result = s.find_mut(id)?;
            Some(match &fetched {
                Ok(content) => {
                    result.data = Some(content.clone());
                    result.timestamp = Some(now);
                    result.status = AutomationStatus::Fresh;
                    result.error = None;
                    RefreshOutcome::Fresh
                }
                Err(e) => {
                    result.status = AutomationStatus::Error;
                    result.error = Some(e.to_string());
                    RefreshOutcome::Failed(e.to_string())
                }
            })
        });
        guard.settle();

        match outcome {
            Some(outcome) => {
                tracing::debug!(automation = id, outcome = ?outcome, "refresh finished");
                outcome
            }
            None => {
                tracing::debug!(automation = id, "automation removed during refresh");
                RefreshOutcome::Removed
            }
        }
    }

    /// Refresh every stale automation concurrently.
    pub async fn refresh_all_stale(&self) -> Vec<(String, RefreshOutcome)> {
        let ids: Vec<String> = self
            .get_stale_automations()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let outcomes = join_all(ids.iter().map(|id| self.refresh(id))).await;
        ids.into_iter().zip(outcomes).collect()
    }

    /// Force a result stale regardless of its timestamp.
    pub fn mark_as_stale(&self, id: &str) -> bool {
        self.inner
            .update(|s| {
                let result = s.find_mut(id)?;
                result.status = AutomationStatus::Stale;
                Some(())
            })
            .is_some()
    }

    /// Whether the result needs a refresh. `None` for unknown ids.
    pub fn is_stale(&self, id: &str) -> Option<bool> {
        let now = self.clock.now();
        self.inner.get_state().find(id).map(|r| needs_refresh(r, now))
    }

    /// The first fresh result of `kind` that has data.
    pub fn get_fresh_data(&self, kind: DataCategory) -> Option<AutomationResult> {
        let now = self.clock.now();
        self.inner
            .get_state()
            .results
            .iter()
            .find(|r| r.kind == kind && r.data.is_some() && !needs_refresh(r, now))
            .cloned()
    }

    pub fn get_stale_automations(&self) -> Vec<AutomationResult> {
        let now = self.clock.now();
        self.inner
            .get_state()
            .results
            .iter()
            .filter(|r| needs_refresh(r, now))
            .cloned()
            .collect()
    }

    /// Store externally obtained data as a fresh result.
    pub fn record_result(&self, id: &str, data: WidgetContent) -> bool {
        let now = self.clock.now();
        self.inner
            .update(|s| {
                let result = s.find_mut(id)?;
                result.data = Some(data);
                result.timestamp = Some(now);
                result.status = AutomationStatus::Fresh;
                result.error = None;
                Some(())
            })
            .is_some()
    }

    pub fn set_refresh_interval(&self, id: &str, minutes: u32) -> bool {
        self.inner
            .update(|s| {
                let result = s.find_mut(id)?;
                result.refresh_interval = minutes.max(1);
                Some(())
            })
            .is_some()
    }

    pub fn set_params(&self, params: FetchParams) {
        self.inner.set_state(|s| s.params = params);
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner
            .update(|s| {
                let index = s.results.iter().position(|r| r.id == id)?;
                s.results.remove(index);
                Some(())
            })
            .is_some()
    }

    /// Add an automation. Returns `false` if the id is taken.
    pub fn register(&self, id: &str, kind: DataCategory, refresh_interval: u32) -> bool {
        self.inner
            .update(|s| {
                if s.find(id).is_some() {
                    return None;
                }
                s.results
                    .push(AutomationResult::new(id, kind, refresh_interval.max(1)));
                Some(())
            })
            .is_some()
    }

    pub fn store(&self) -> &PersistedStore<HubState> {
        &self.inner
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}

fn needs_refresh(result: &AutomationResult, now: chrono::DateTime<chrono::Utc>) -> bool {
    match result.status {
        AutomationStatus::Loading => false,
        AutomationStatus::Stale | AutomationStatus::Error => true,
        AutomationStatus::Fresh => result.is_stale_at(now),
    }
}
