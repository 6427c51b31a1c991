//! Global configuration loader for Iverton.
//!
//! Reads `config.toml` from the data directory (`~/.iverton/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies `IVERTON_*` environment
//! overrides.

use std::path::Path;

use iverton_types::config::GlobalConfig;

pub const ENV_WEBHOOK_BASE_URL: &str = "IVERTON_WEBHOOK_BASE_URL";
pub const ENV_WEBHOOKS_ENABLED: &str = "IVERTON_WEBHOOKS_ENABLED";
pub const ENV_WEBHOOK_TIMEOUT_MS: &str = "IVERTON_WEBHOOK_TIMEOUT_MS";

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`] (webhooks disabled).
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Load `config.toml` and apply overrides from the process environment.
pub async fn load_config_with_env(data_dir: &Path) -> GlobalConfig {
    let config = load_global_config(data_dir).await;
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Apply `IVERTON_*` overrides read through `lookup`.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(
    mut config: GlobalConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> GlobalConfig {
    if let Some(base_url) = lookup(ENV_WEBHOOK_BASE_URL) {
        config.webhook.base_url = base_url.trim().to_string();
    }

    if let Some(raw) = lookup(ENV_WEBHOOKS_ENABLED) {
        match parse_flag(&raw) {
            Some(enabled) => config.webhook.enabled = enabled,
            None => tracing::warn!("Ignoring {ENV_WEBHOOKS_ENABLED}={raw:?}: expected a boolean"),
        }
    }

    if let Some(raw) = lookup(ENV_WEBHOOK_TIMEOUT_MS) {
        match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => config.webhook.timeout_ms = ms,
            _ => tracing::warn!("Ignoring {ENV_WEBHOOK_TIMEOUT_MS}={raw:?}: expected milliseconds"),
        }
    }

    config
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
