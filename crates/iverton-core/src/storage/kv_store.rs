//! Key-value backing trait.
//!
//! Defines the interface for the storage areas stores persist into.
//! Implementations: `MemoryKvStore` (volatile, this crate) and
//! `SqliteKvStore` (durable, iverton-infra).

use iverton_types::error::RepositoryError;
use iverton_types::storage::KvEntry;

/// A flat key-value area holding JSON values. Last write wins.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KvBacking: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if key does not exist.
    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all keys, sorted.
    fn list_keys(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    /// Get the full entry including timestamps.
    fn get_entry(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<KvEntry>, RepositoryError>> + Send;
}
