//! Automation result types.
//!
//! An automation result is the cached outcome of one external data-fetch
//! category together with its freshness status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::payload::{DataCategory, WidgetContent};

/// Freshness of an automation result.
///
/// `stale -> loading -> fresh | error`, and `fresh -> stale` once the refresh
/// interval has elapsed (evaluated lazily on read).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationStatus {
    Fresh,
    #[default]
    Stale,
    Loading,
    Error,
}

impl fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomationStatus::Fresh => write!(f, "fresh"),
            AutomationStatus::Stale => write!(f, "stale"),
            AutomationStatus::Loading => write!(f, "loading"),
            AutomationStatus::Error => write!(f, "error"),
        }
    }
}

/// One cached external data-fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationResult {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DataCategory,
    #[serde(default)]
    pub data: Option<WidgetContent>,
    /// Time of the last successful refresh.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AutomationStatus,
    /// Minutes a fresh result stays fresh.
    pub refresh_interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AutomationResult {
    /// A never-fetched result: `stale`, no data.
    pub fn new(id: impl Into<String>, kind: DataCategory, refresh_interval: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            data: None,
            timestamp: None,
            status: AutomationStatus::Stale,
            refresh_interval,
            error: None,
        }
    }

    /// Whether `now` is past the refresh window.
    ///
    /// Strictly greater than `refresh_interval` minutes since `timestamp`;
    /// a result with no timestamp is always stale. Pure: never mutates.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match self.timestamp {
            None => true,
            Some(ts) => {
                let window_ms = i64::from(self.refresh_interval) * 60_000;
                (now - ts).num_milliseconds() > window_ms
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_result_is_stale_without_data() {
        let result = AutomationResult::new("seo-ranking", DataCategory::SeoRanking, 60);
        assert_eq!(result.status, AutomationStatus::Stale);
        assert!(result.data.is_none());
        assert!(result.is_stale_at(Utc::now()));
    }

    #[test]
    fn test_staleness_boundary() {
        let t0 = Utc::now();
        let mut result = AutomationResult::new("backlinks", DataCategory::Backlinks, 60);
        result.status = AutomationStatus::Fresh;
        result.timestamp = Some(t0);

        let window = Duration::minutes(60);
        assert!(!result.is_stale_at(t0 + window - Duration::milliseconds(1)));
        assert!(!result.is_stale_at(t0 + window));
        assert!(result.is_stale_at(t0 + window + Duration::milliseconds(1)));
    }

    #[test]
    fn test_serialized_field_names() {
        let result = AutomationResult::new("hashtags", DataCategory::Hashtags, 30);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "hashtags");
        assert_eq!(json["refreshInterval"], 30);
        assert_eq!(json["status"], "stale");
        assert!(json["data"].is_null());
    }
}
