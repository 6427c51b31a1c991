//! SQLite-backed durable storage.

pub mod kv;
pub mod pool;
