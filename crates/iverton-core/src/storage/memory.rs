//! Volatile in-memory key-value area.
//!
//! Holds data for the lifetime of the process only. Used as the session
//! area for auth tokens and as a drop-in backing in tests.

use chrono::Utc;
use dashmap::DashMap;
use iverton_types::error::RepositoryError;
use iverton_types::storage::KvEntry;

use super::kv_store::KvBacking;

/// `DashMap`-backed implementation of `KvBacking`.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, KvEntry>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvBacking for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        let now = Utc::now();
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| {
                entry.value = value.clone();
                entry.updated_at = now;
            })
            .or_insert_with(|| KvEntry {
                key: key.to_string(),
                value: value.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, RepositoryError> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_entry(&self, key: &str) -> Result<Option<KvEntry>, RepositoryError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }
}
