//! Infrastructure layer for Iverton.
//!
//! Implements the traits defined in `iverton-core`: the SQLite durable
//! key-value backing, the reqwest webhook transport and the SHA-256 password
//! hasher. Also loads configuration and resolves the data directory.

pub mod config;
pub mod crypto;
pub mod filesystem;
pub mod sqlite;
pub mod webhook;
