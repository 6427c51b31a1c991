//! Persistence middleware.
//!
//! `PersistedStore<S>` wraps a [`Store`] and mirrors a projection of its state
//! ("partialize") into a [`KvBacking`] under the store's name.
//!
//! - On open, any existing snapshot is merged over the defaults before the
//!   store is returned (see [`super::merge`]).
//! - After every mutation the partialized state is queued to a background
//!   writer task. Mutations never wait for the write; writes are applied in
//!   order and superseded queued writes are coalesced.
//! - Write and read failures are logged and never propagate.
//!
//! Snapshots are stored as `{"state": <partialized>, "version": n}`. A
//! snapshot with a different version is discarded.

use std::ops::Deref;
use std::sync::Arc;

use iverton_types::error::PersistenceError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::engine::Store;
use super::merge::merge_fields;
use crate::storage::KvBacking;

/// State that can be mirrored to a key-value backing.
pub trait PersistedState: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The fields to persist. Defaults to the whole state.
    fn partialize(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Backing key and schema version of a persisted store.
#[derive(Debug, Clone)]
pub struct PersistOptions {
    pub name: String,
    pub version: u32,
}

impl PersistOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

enum PersistCommand {
    Write(Value),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// A store whose state is mirrored to a key-value backing.
pub struct PersistedStore<S> {
    store: Arc<Store<S>>,
    writer: mpsc::UnboundedSender<PersistCommand>,
    options: PersistOptions,
}

impl<S: PersistedState> PersistedStore<S> {
    /// Hydrate from `backing` and start mirroring.
    ///
    /// Must be called from within a Tokio runtime (the writer is spawned).
    pub async fn open<B>(backing: Arc<B>, options: PersistOptions, defaults: S) -> Self
    where
        B: KvBacking + 'static,
    {
        let initial = hydrate(backing.as_ref(), &options, defaults).await;
        let store = Arc::new(Store::new(options.name.clone(), initial));

        let (writer, commands) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(backing, options.name.clone(), commands));

        let queue = writer.clone();
        let name = options.name.clone();
        let version = options.version;
        let _mirror = store.subscribe(move |next: &S, _prev: &S| {
            match envelope(next, version) {
                Ok(snapshot) => {
                    // A closed queue means the store is being torn down.
                    let _ = queue.send(PersistCommand::Write(snapshot));
                }
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to serialize store snapshot");
                }
            }
        });

        Self {
            store,
            writer,
            options,
        }
    }

    /// The underlying store, for sharing with other owners.
    pub fn store(&self) -> &Arc<Store<S>> {
        &self.store
    }

    pub fn options(&self) -> &PersistOptions {
        &self.options
    }

    /// Wait until every write queued so far has reached the backing.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writer.send(PersistCommand::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    /// Remove the persisted snapshot. In-memory state is unchanged.
    pub fn clear_persisted(&self) {
        let _ = self.writer.send(PersistCommand::Remove);
    }
}

impl<S> Deref for PersistedStore<S> {
    type Target = Store<S>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

fn envelope<S: PersistedState>(state: &S, version: u32) -> Result<Value, serde_json::Error> {
    Ok(serde_json::json!({
        "state": state.partialize()?,
        "version": version,
    }))
}

async fn hydrate<S, B>(backing: &B, options: &PersistOptions, defaults: S) -> S
where
    S: PersistedState,
    B: KvBacking,
{
    let raw = match backing.get(&options.name).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!(store = %options.name, "no persisted snapshot, using defaults");
            return defaults;
        }
        Err(e) => {
            tracing::warn!(store = %options.name, error = %e, "unreadable snapshot, using defaults");
            return defaults;
        }
    };

    match restore(options, defaults.clone(), raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(store = %options.name, error = %e, "discarding persisted snapshot");
            defaults
        }
    }
}

/// Merge a raw snapshot envelope over `defaults`.
pub fn restore<S: PersistedState>(
    options: &PersistOptions,
    defaults: S,
    raw: Value,
) -> Result<S, PersistenceError> {
    let malformed = |message: &str| PersistenceError::MalformedSnapshot {
        store: options.name.clone(),
        message: message.to_string(),
    };

    let envelope = raw.as_object().ok_or_else(|| malformed("not an object"))?;
    let snapshot = envelope
        .get("state")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'state' object"))?;

    let found = envelope
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    if found != options.version {
        return Err(PersistenceError::VersionMismatch {
            store: options.name.clone(),
            expected: options.version,
            found,
        });
    }

    let defaults_json = serde_json::to_value(&defaults).map_err(|e| PersistenceError::Serialize {
        store: options.name.clone(),
        message: e.to_string(),
    })?;

    let outcome = merge_fields::<S>(defaults_json, snapshot)
        .ok_or_else(|| malformed("default state does not round-trip"))?;
    if !outcome.rejected.is_empty() {
        tracing::warn!(
            store = %options.name,
            fields = ?outcome.rejected,
            "persisted fields failed to parse, using defaults for them"
        );
    }
    Ok(outcome.state)
}

async fn run_writer<B: KvBacking>(
    backing: Arc<B>,
    name: String,
    mut commands: mpsc::UnboundedReceiver<PersistCommand>,
) {
    let mut pending: Option<PersistCommand> = None;

    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match commands.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            PersistCommand::Write(mut snapshot) => {
                // Coalesce writes already queued behind this one.
                while let Ok(next) = commands.try_recv() {
                    match next {
                        PersistCommand::Write(newer) => snapshot = newer,
                        other => {
                            pending = Some(other);
                            break;
                        }
                    }
                }
                if let Err(e) = backing.set(&name, &snapshot).await {
                    let error = PersistenceError::Backing {
                        store: name.clone(),
                        source: e,
                    };
                    tracing::warn!(error = %error, "failed to persist store snapshot");
                }
            }
            PersistCommand::Remove => {
                if let Err(e) = backing.remove(&name).await {
                    tracing::warn!(store = %name, error = %e, "failed to remove persisted snapshot");
                }
            }
            PersistCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!(store = %name, "persistence writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use iverton_types::error::RepositoryError;
    use iverton_types::storage::KvEntry;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        count: u32,
        #[serde(default)]
        draft: Option<String>,
    }

    impl Default for Prefs {
        fn default() -> Self {
            Self {
                theme: "light".to_string(),
                count: 0,
                draft: None,
            }
        }
    }

    impl PersistedState for Prefs {
        fn partialize(&self) -> Result<Value, serde_json::Error> {
            Ok(serde_json::json!({ "theme": self.theme, "count": self.count }))
        }
    }

    /// Backing whose writes always fail.
    #[derive(Default)]
    struct FullBacking {
        attempts: AtomicUsize,
    }

    impl KvBacking for FullBacking {
        async fn get(&self, _key: &str) -> Result<Option<Value>, RepositoryError> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &Value) -> Result<(), RepositoryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::Query("quota exceeded".to_string()))
        }
        async fn remove(&self, _key: &str) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn list_keys(&self) -> Result<Vec<String>, RepositoryError> {
            Ok(Vec::new())
        }
        async fn get_entry(&self, _key: &str) -> Result<Option<KvEntry>, RepositoryError> {
            Ok(None)
        }
    }

    /// Backing whose reads always fail, as with a torn snapshot.
    struct TornBacking;

    impl KvBacking for TornBacking {
        async fn get(&self, _key: &str) -> Result<Option<Value>, RepositoryError> {
            Err(RepositoryError::Query("invalid JSON value".to_string()))
        }
        async fn set(&self, _key: &str, _value: &Value) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn remove(&self, _key: &str) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn list_keys(&self) -> Result<Vec<String>, RepositoryError> {
            Ok(Vec::new())
        }
        async fn get_entry(&self, _key: &str) -> Result<Option<KvEntry>, RepositoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn writes_partialized_envelope() {
        let backing = Arc::new(MemoryKvStore::new());
        let store =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;

        store.set_state(|s| {
            s.theme = "dark".to_string();
            s.draft = Some("unsaved".to_string());
        });
        store.flush().await;

        let raw = backing.get("prefs").await.unwrap().unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"state": {"theme": "dark", "count": 0}, "version": 0})
        );
    }

    #[tokio::test]
    async fn reopen_restores_persisted_fields_and_defaults_the_rest() {
        let backing = Arc::new(MemoryKvStore::new());
        {
            let store = PersistedStore::open(
                Arc::clone(&backing),
                PersistOptions::new("prefs"),
                Prefs::default(),
            )
            .await;
            store.set_state(|s| {
                s.count = 7;
                s.draft = Some("lost on reload".to_string());
            });
            store.flush().await;
        }

        let reopened =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;
        let state = reopened.get_state();
        assert_eq!(state.count, 7);
        assert_eq!(state.theme, "light");
        assert_eq!(state.draft, None);
    }

    #[tokio::test]
    async fn version_mismatch_discards_snapshot() {
        let backing = Arc::new(MemoryKvStore::new());
        backing
            .set(
                "prefs",
                &serde_json::json!({"state": {"theme": "dark"}, "version": 1}),
            )
            .await
            .unwrap();

        let store = PersistedStore::open(
            Arc::clone(&backing),
            PersistOptions::new("prefs").with_version(2),
            Prefs::default(),
        )
        .await;
        assert_eq!(store.get_state().theme, "light");
    }

    #[tokio::test]
    async fn malformed_field_falls_back_to_default() {
        let backing = Arc::new(MemoryKvStore::new());
        backing
            .set(
                "prefs",
                &serde_json::json!({"state": {"theme": "dark", "count": "many"}, "version": 0}),
            )
            .await
            .unwrap();

        let store =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;
        let state = store.get_state();
        assert_eq!(state.theme, "dark");
        assert_eq!(state.count, 0);
    }

    #[tokio::test]
    async fn non_envelope_snapshot_uses_defaults() {
        let backing = Arc::new(MemoryKvStore::new());
        backing.set("prefs", &serde_json::json!("garbage")).await.unwrap();

        let store =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;
        assert_eq!(*store.get_state(), Prefs::default());
    }

    #[tokio::test]
    async fn unreadable_snapshot_uses_defaults() {
        let store =
            PersistedStore::open(Arc::new(TornBacking), PersistOptions::new("prefs"), Prefs::default())
                .await;
        assert_eq!(*store.get_state(), Prefs::default());
    }

    #[tokio::test]
    async fn write_failures_do_not_break_mutations() {
        let backing = Arc::new(FullBacking::default());
        let store =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;

        store.set_state(|s| s.count = 1);
        store.flush().await;
        store.set_state(|s| s.count = 2);
        store.flush().await;

        assert_eq!(store.get_state().count, 2);
        assert_eq!(backing.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_write_wins_after_burst() {
        let backing = Arc::new(MemoryKvStore::new());
        let store =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;

        for i in 1..=50 {
            store.set_state(|s| s.count = i);
        }
        store.flush().await;

        let raw = backing.get("prefs").await.unwrap().unwrap();
        assert_eq!(raw["state"]["count"], 50);
    }

    #[tokio::test]
    async fn clear_persisted_removes_key() {
        let backing = Arc::new(MemoryKvStore::new());
        let store =
            PersistedStore::open(Arc::clone(&backing), PersistOptions::new("prefs"), Prefs::default())
                .await;
        store.set_state(|s| s.count = 3);
        store.clear_persisted();
        store.flush().await;

        assert!(backing.get("prefs").await.unwrap().is_none());
        assert_eq!(store.get_state().count, 3);
    }
}
