//! Reactive stores and their persistence middleware.

pub mod engine;
pub mod merge;
pub mod persist;

pub use engine::{JsonMap, Store, Subscription};
pub use persist::{PersistOptions, PersistedState, PersistedStore};
