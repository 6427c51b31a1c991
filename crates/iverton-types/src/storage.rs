//! Key-value backing types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in a key-value backing area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence key of the widget grid store.
pub const GRID_WIDGET_STORAGE: &str = "grid-widget-storage";
/// Persistence key of the automation hub store.
pub const AUTOMATION_HUB_STORAGE: &str = "automation-hub-storage";
/// Persistence key of the notes store.
pub const NOTES_STORAGE: &str = "notes-storage";
/// Persistence key of the settings store.
pub const SETTINGS_STORAGE: &str = "iverton-settings-storage";
/// Persistence key of the CRM store.
pub const CRM_STORAGE: &str = "crm-storage";
/// Persistence key of the custom auth store (registered accounts).
pub const AUTH_STORAGE: &str = "custom-auth-storage";
/// Session token key, held in the volatile area and optionally mirrored to the durable one.
pub const AUTH_SESSION_KEY: &str = "auth-session";
