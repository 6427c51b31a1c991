//! Cryptographic operations for Iverton.
//!
//! - `hash`: Argon2id password hashing

pub mod hash;
