//! Stores, persistence middleware and data services for Iverton.
//!
//! This crate defines the ports (`KvBacking`, `WebhookTransport`,
//! `PasswordHasher`, `Clock`) that the infrastructure layer implements. It
//! depends only on `iverton-types`, never on `iverton-infra` or any database
//! or HTTP crate.

pub mod auth;
pub mod automation;
pub mod clock;
pub mod crm;
pub mod generator;
pub mod notes;
pub mod settings;
pub mod storage;
pub mod store;
pub mod usage;
pub mod webhook;
pub mod widget;
