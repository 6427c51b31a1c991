//! Key-value backing abstractions.
//!
//! Defines the trait every persistence area implements, plus the volatile
//! in-memory area. The durable SQLite area lives in iverton-infra.

pub mod kv_store;
pub mod memory;

pub use kv_store::KvBacking;
pub use memory::MemoryKvStore;
