//! Shared domain types for Iverton.
//!
//! This crate contains the domain types used across the dashboard: widgets and
//! their payloads, automation results, accounts and sessions, notes, settings,
//! CRM contacts, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod auth;
pub mod automation;
pub mod config;
pub mod crm;
pub mod error;
pub mod note;
pub mod payload;
pub mod settings;
pub mod storage;
pub mod usage;
pub mod widget;
