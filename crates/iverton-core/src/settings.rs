//! Settings store.

use std::sync::Arc;

use iverton_types::settings::{Settings, Theme};
use iverton_types::storage::SETTINGS_STORAGE;

use crate::storage::KvBacking;
use crate::store::{PersistOptions, PersistedState, PersistedStore};

/// Schema version of the persisted settings snapshot.
pub const SETTINGS_VERSION: u32 = 1;

impl PersistedState for Settings {}

pub struct SettingsStore {
    inner: PersistedStore<Settings>,
}

impl SettingsStore {
    pub async fn open<B: KvBacking + 'static>(backing: Arc<B>) -> Self {
        let inner = PersistedStore::open(
            backing,
            PersistOptions::new(SETTINGS_STORAGE).with_version(SETTINGS_VERSION),
            Settings::default(),
        )
        .await;
        Self { inner }
    }

    pub fn settings(&self) -> Settings {
        (*self.inner.get_state()).clone()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.inner.set_state(|s| s.theme = theme);
    }

    /// Flip notifications and return the new value.
    pub fn toggle_notifications(&self) -> bool {
        self.inner
            .update(|s| {
                s.notifications_enabled = !s.notifications_enabled;
                Some(s.notifications_enabled)
            })
            .unwrap_or_default()
    }

    pub fn update(&self, change: impl FnOnce(&mut Settings)) {
        self.inner.set_state(|s| {
            change(s);
            s.default_refresh_interval = s.default_refresh_interval.max(1);
        });
    }

    pub fn reset(&self) {
        self.inner.replace_state(Settings::default());
    }

    pub fn store(&self) -> &PersistedStore<Settings> {
        &self.inner
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}
