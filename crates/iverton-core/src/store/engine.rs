//! Observable state container.
//!
//! A `Store<S>` holds an immutable snapshot (`Arc<S>`) of its state. Every
//! mutation clones the current snapshot, applies the change to the copy, swaps
//! it in, and then notifies listeners synchronously in registration order with
//! `(next, prev)`. Snapshots are never mutated in place, so a reader holding an
//! `Arc<S>` keeps a consistent view.
//!
//! A listener that panics is caught and logged; the remaining listeners still
//! run and the mutating call returns normally.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

type Listener<S> = Arc<dyn Fn(&S, &S) + Send + Sync>;

struct ListenerSet<S> {
    next_id: u64,
    entries: Vec<(u64, Listener<S>)>,
}

impl<S> ListenerSet<S> {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// JSON object state, for stores whose shape is not known at compile time.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// An isolated reactive state container.
pub struct Store<S> {
    name: String,
    state: RwLock<Arc<S>>,
    listeners: Arc<Mutex<ListenerSet<S>>>,
}

impl<S> Store<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a store holding `initial`. `name` is used for logging and, when
    /// persisted, as the backing key.
    pub fn new(name: impl Into<String>, initial: S) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(Arc::new(initial)),
            listeners: Arc::new(Mutex::new(ListenerSet {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current snapshot. Never stale relative to the last completed mutation.
    pub fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply `mutate` to a copy of the current state and publish it.
    ///
    /// Fields the closure does not touch keep their previous values.
    pub fn set_state(&self, mutate: impl FnOnce(&mut S)) {
        self.update(|draft| {
            mutate(draft);
            Some(())
        });
    }

    /// Conditionally apply a mutation.
    ///
    /// If `mutate` returns `None` the draft is discarded: the state is not
    /// replaced and no listener fires. Otherwise the draft is published and
    /// the closure's value is returned.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut S) -> Option<R>) -> Option<R> {
        let (result, prev, next) = {
            let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let mut draft = S::clone(&current);
            let result = mutate(&mut draft)?;
            let next = Arc::new(draft);
            let prev = std::mem::replace(&mut *current, Arc::clone(&next));
            (result, prev, next)
        };

        self.notify(&next, &prev);
        Some(result)
    }

    /// Replace the whole state.
    pub fn replace_state(&self, next: S) {
        self.set_state(|draft| *draft = next);
    }

    /// Register a listener called with `(next, prev)` after every mutation.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        let id = {
            let mut set = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            let id = set.next_id;
            set.next_id += 1;
            set.entries.push((id, Arc::new(listener)));
            id
        };

        let listeners: Weak<Mutex<ListenerSet<S>>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Register a listener that fires only when `selector`'s output changes.
    ///
    /// The listener receives `(selected_next, selected_prev)`.
    pub fn subscribe_with_selector<T, Sel, F>(&self, selector: Sel, listener: F) -> Subscription
    where
        T: PartialEq + 'static,
        Sel: Fn(&S) -> T + Send + Sync + 'static,
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.subscribe(move |next, prev| {
            let selected_next = selector(next);
            let selected_prev = selector(prev);
            if selected_next != selected_prev {
                listener(&selected_next, &selected_prev);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn notify(&self, next: &S, prev: &S) {
        // Snapshot the set so listeners may subscribe, unsubscribe or mutate
        // the store re-entrantly.
        let snapshot: Vec<(u64, Listener<S>)> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone();

        for (id, listener) in snapshot {
            let still_subscribed = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(id);
            if !still_subscribed {
                continue;
            }

            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(next, prev))) {
                tracing::error!(
                    store = %self.name,
                    listener = id,
                    message = %panic_message(panic.as_ref()),
                    "store listener panicked"
                );
            }
        }
    }
}

impl Store<JsonMap> {
    /// Shallow-merge `partial` into the top level of the state.
    ///
    /// Nested objects are replaced, not merged.
    pub fn merge(&self, partial: JsonMap) {
        self.set_state(|draft| {
            for (key, value) in partial {
                draft.insert(key, value);
            }
        });
    }
}

impl<S> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listener_count = self
            .listeners
            .lock()
            .map(|set| set.entries.len())
            .unwrap_or_default();
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("listener_count", &listener_count)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by `subscribe`.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Remove the listener. A no-op if the store has already been dropped.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter {
        count: u32,
        label: String,
        tags: Vec<String>,
    }

    #[test]
    fn set_state_keeps_untouched_fields() {
        let store = Store::new(
            "counter",
            Counter {
                count: 1,
                label: "a".to_string(),
                tags: vec!["x".to_string()],
            },
        );

        store.set_state(|s| s.count = 2);

        let state = store.get_state();
        assert_eq!(state.count, 2);
        assert_eq!(state.label, "a");
        assert_eq!(state.tags, vec!["x".to_string()]);
    }

    #[test]
    fn snapshots_are_not_mutated_in_place() {
        let store = Store::new("counter", Counter::default());
        let before = store.get_state();
        store.set_state(|s| s.count = 10);
        assert_eq!(before.count, 0);
        assert_eq!(store.get_state().count, 10);
    }

    #[test]
    fn json_merge_is_shallow() {
        let initial: JsonMap = serde_json::from_value(serde_json::json!({
            "a": 1,
            "nested": {"x": 1, "y": 2}
        }))
        .unwrap();
        let store = Store::new("json", initial);

        let partial: JsonMap =
            serde_json::from_value(serde_json::json!({"nested": {"x": 5}, "b": true})).unwrap();
        store.merge(partial);

        let state = store.get_state();
        assert_eq!(
            serde_json::Value::Object((*state).clone()),
            serde_json::json!({"a": 1, "b": true, "nested": {"x": 5}})
        );
    }

    #[test]
    fn every_listener_fires_once_per_mutation_in_order() {
        let store = Store::new("counter", Counter::default());
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&log);
        let _a = store.subscribe(move |next: &Counter, prev: &Counter| {
            first.lock().unwrap().push(("first", prev.count, next.count));
        });
        let second = Arc::clone(&log);
        let _b = store.subscribe(move |next: &Counter, prev: &Counter| {
            second.lock().unwrap().push(("second", prev.count, next.count));
        });

        store.set_state(|s| s.count = 1);
        store.set_state(|s| s.count = 2);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("first", 0, 1),
                ("second", 0, 1),
                ("first", 1, 2),
                ("second", 1, 2),
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = Store::new("counter", Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let sub = store.subscribe(move |_: &Counter, _: &Counter| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set_state(|s| s.count += 1);
        sub.unsubscribe();
        store.set_state(|s| s.count += 1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn selector_listener_ignores_unrelated_changes() {
        let store = Store::new("counter", Counter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = store.subscribe_with_selector(
            |state: &Counter| state.label.clone(),
            move |next: &String, prev: &String| {
                s.lock().unwrap().push((prev.clone(), next.clone()));
            },
        );

        store.set_state(|s| s.count = 5);
        store.set_state(|s| s.label = "renamed".to_string());
        store.set_state(|s| s.label = "renamed".to_string());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(String::new(), "renamed".to_string())]
        );
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let store = Store::new("counter", Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let _bad = store.subscribe(|_: &Counter, _: &Counter| panic!("listener failure"));
        let c = Arc::clone(&calls);
        let _good = store.subscribe(move |_: &Counter, _: &Counter| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set_state(|s| s.count = 1);
        store.set_state(|s| s.count = 2);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get_state().count, 2);
    }

    #[test]
    fn update_returning_none_publishes_nothing() {
        let store = Store::new("counter", Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let _sub = store.subscribe(move |_: &Counter, _: &Counter| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let before = store.get_state();
        let result: Option<()> = store.update(|s| {
            s.count = 99;
            None
        });

        assert!(result.is_none());
        assert!(Arc::ptr_eq(&before, &store.get_state()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_mutate_store_reentrantly() {
        let store = Arc::new(Store::new("counter", Counter::default()));
        let inner = Arc::downgrade(&store);
        let _sub = store.subscribe(move |next: &Counter, _: &Counter| {
            if next.count == 1 {
                if let Some(store) = inner.upgrade() {
                    store.set_state(|s| s.label = "bumped".to_string());
                }
            }
        });

        store.set_state(|s| s.count = 1);

        let state = store.get_state();
        assert_eq!(state.count, 1);
        assert_eq!(state.label, "bumped");
    }

    #[test]
    fn listener_unsubscribed_mid_dispatch_is_skipped() {
        let store = Store::new("counter", Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let v = Arc::clone(&victim);
        let _killer = store.subscribe(move |_: &Counter, _: &Counter| {
            if let Some(sub) = v.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        let c = Arc::clone(&calls);
        let sub = store.subscribe(move |_: &Counter, _: &Counter| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock().unwrap() = Some(sub);

        store.set_state(|s| s.count = 1);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn debug_impl() {
        let store = Store::new("counter", Counter::default());
        let _sub = store.subscribe(|_: &Counter, _: &Counter| {});
        let debug = format!("{store:?}");
        assert!(debug.contains("counter"));
        assert!(debug.contains("listener_count"));
    }
}
