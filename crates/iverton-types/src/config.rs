//! Global configuration types for Iverton.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! webhook gateway, session policy, automation refresh defaults and usage
//! batching. Every field has a default so an empty file is valid.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `~/.iverton/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub webhook: WebhookSettings,

    #[serde(default)]
    pub session: SessionPolicy,

    #[serde(default)]
    pub automation: AutomationSettings,

    #[serde(default)]
    pub usage: UsageSettings,
}

/// How the webhook gateway chooses a timeout when the caller gives none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Always use `timeout_ms`.
    #[default]
    Fixed,
    /// Pick a timeout from keywords in the endpoint path.
    ByOperation,
}

/// Webhook gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Prefix joined with each endpoint path.
    #[serde(default)]
    pub base_url: String,

    /// When false every call resolves to "no data" without touching the network.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,

    /// Optional bearer token sent with every request.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            enabled: false,
            timeout_ms: default_timeout_ms(),
            timeout_policy: TimeoutPolicy::default(),
            api_key: None,
        }
    }
}

/// Session lifetime policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Validity window of a "remember me" session mirrored to durable storage.
    #[serde(default = "default_remember_me_ttl_hours")]
    pub remember_me_ttl_hours: u32,
}

fn default_remember_me_ttl_hours() -> u32 {
    24
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            remember_me_ttl_hours: default_remember_me_ttl_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSettings {
    #[serde(default = "default_refresh_interval_minutes")]
    pub default_refresh_interval_minutes: u32,
}

fn default_refresh_interval_minutes() -> u32 {
    60
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            default_refresh_interval_minutes: default_refresh_interval_minutes(),
        }
    }
}

/// Batch window for syncing usage events to the automation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSettings {
    #[serde(default = "default_batch_window_secs")]
    pub batch_window_secs: u64,

    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_batch_window_secs() -> u64 {
    300
}

fn default_max_batch() -> usize {
    50
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            batch_window_secs: default_batch_window_secs(),
            max_batch: default_max_batch(),
        }
    }
}
