//! Widget payload types.
//!
//! Every data-bearing widget renders one of the typed payloads below.
//! `WidgetContent` is the tagged union over them, with an `Unknown` variant
//! that keeps foreign JSON shapes intact instead of rejecting them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// DataCategory
// ---------------------------------------------------------------------------

/// Category of externally sourced dashboard data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataCategory {
    SeoRanking,
    Backlinks,
    Hashtags,
    CompetitorIntel,
    TrafficOverview,
}

impl DataCategory {
    pub const ALL: [DataCategory; 5] = [
        DataCategory::SeoRanking,
        DataCategory::Backlinks,
        DataCategory::Hashtags,
        DataCategory::CompetitorIntel,
        DataCategory::TrafficOverview,
    ];

    /// Stable kebab-case tag, also used as the automation id.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::SeoRanking => "seo-ranking",
            DataCategory::Backlinks => "backlinks",
            DataCategory::Hashtags => "hashtags",
            DataCategory::CompetitorIntel => "competitor-intel",
            DataCategory::TrafficOverview => "traffic-overview",
        }
    }

    /// Webhook endpoint path for this category.
    pub fn endpoint(&self) -> String {
        format!("/{}", self.as_str())
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown data category: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// FetchParams
// ---------------------------------------------------------------------------

/// Request parameters sent to the webhooks and fed to the generators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl FetchParams {
    pub fn for_site(website_url: impl Into<String>, time_duration: impl Into<String>) -> Self {
        Self {
            website_url: Some(website_url.into()),
            time_duration: Some(time_duration.into()),
            keywords: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRanking {
    pub keyword: String,
    pub position: u32,
    pub previous_position: u32,
    pub search_volume: u32,
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoRankingData {
    pub target_url: String,
    pub time_duration: String,
    pub visibility_score: f64,
    pub keywords: Vec<KeywordRanking>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferringDomain {
    pub domain: String,
    pub authority: u8,
    pub links: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklinkData {
    pub target_url: String,
    pub total_backlinks: u32,
    pub referring_domains: u32,
    pub domain_authority: u8,
    pub new_links: u32,
    pub lost_links: u32,
    pub top_referrers: Vec<ReferringDomain>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Steady,
    Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtagStat {
    pub tag: String,
    pub posts: u32,
    pub engagement_rate: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtagData {
    pub target_url: String,
    pub hashtags: Vec<HashtagStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorSnapshot {
    pub domain: String,
    pub shared_keywords: u32,
    pub estimated_traffic: u32,
    pub authority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorData {
    pub target_url: String,
    pub competitors: Vec<CompetitorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficData {
    pub target_url: String,
    pub time_duration: String,
    pub sessions: u32,
    pub bounce_rate: f64,
    pub avg_session_secs: u32,
    pub daily_sessions: Vec<u32>,
}

// ---------------------------------------------------------------------------
// WidgetContent
// ---------------------------------------------------------------------------

const UNKNOWN_KIND: &str = "unknown";

/// Display payload of a widget, keyed by data category.
///
/// Serialized as `{"kind": "<category>", "data": {...}}`. Anything that does
/// not match a known kind (or whose data does not fit the kind's shape) is
/// kept verbatim as `Unknown`, which is written under the `"unknown"` kind so
/// a raw body never reloads as a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetContent {
    SeoRanking(SeoRankingData),
    Backlinks(BacklinkData),
    Hashtags(HashtagData),
    CompetitorIntel(CompetitorData),
    TrafficOverview(TrafficData),
    Unknown(serde_json::Value),
}

impl WidgetContent {
    /// The category this payload belongs to, if it is a known shape.
    pub fn category(&self) -> Option<DataCategory> {
        match self {
            WidgetContent::SeoRanking(_) => Some(DataCategory::SeoRanking),
            WidgetContent::Backlinks(_) => Some(DataCategory::Backlinks),
            WidgetContent::Hashtags(_) => Some(DataCategory::Hashtags),
            WidgetContent::CompetitorIntel(_) => Some(DataCategory::CompetitorIntel),
            WidgetContent::TrafficOverview(_) => Some(DataCategory::TrafficOverview),
            WidgetContent::Unknown(_) => None,
        }
    }

    /// Decode a raw webhook response body for `category`.
    ///
    /// Responses that do not match the expected shape become `Unknown(raw)`.
    pub fn from_response(category: DataCategory, raw: serde_json::Value) -> Self {
        fn typed<T: serde::de::DeserializeOwned>(raw: &serde_json::Value) -> Option<T> {
            serde_json::from_value(raw.clone()).ok()
        }

        let decoded = match category {
            DataCategory::SeoRanking => typed(&raw).map(WidgetContent::SeoRanking),
            DataCategory::Backlinks => typed(&raw).map(WidgetContent::Backlinks),
            DataCategory::Hashtags => typed(&raw).map(WidgetContent::Hashtags),
            DataCategory::CompetitorIntel => typed(&raw).map(WidgetContent::CompetitorIntel),
            DataCategory::TrafficOverview => typed(&raw).map(WidgetContent::TrafficOverview),
        };
        decoded.unwrap_or(WidgetContent::Unknown(raw))
    }

    /// The `target_url` the payload describes, when the shape has one.
    pub fn target_url(&self) -> Option<&str> {
        match self {
            WidgetContent::SeoRanking(d) => Some(&d.target_url),
            WidgetContent::Backlinks(d) => Some(&d.target_url),
            WidgetContent::Hashtags(d) => Some(&d.target_url),
            WidgetContent::CompetitorIntel(d) => Some(&d.target_url),
            WidgetContent::TrafficOverview(d) => Some(&d.target_url),
            WidgetContent::Unknown(raw) => raw.get("target_url").and_then(|v| v.as_str()),
        }
    }

    fn to_tagged(&self) -> Result<serde_json::Value, serde_json::Error> {
        let (category, data) = match self {
            WidgetContent::SeoRanking(d) => (DataCategory::SeoRanking, serde_json::to_value(d)?),
            WidgetContent::Backlinks(d) => (DataCategory::Backlinks, serde_json::to_value(d)?),
            WidgetContent::Hashtags(d) => (DataCategory::Hashtags, serde_json::to_value(d)?),
            WidgetContent::CompetitorIntel(d) => {
                (DataCategory::CompetitorIntel, serde_json::to_value(d)?)
            }
            WidgetContent::TrafficOverview(d) => {
                (DataCategory::TrafficOverview, serde_json::to_value(d)?)
            }
            WidgetContent::Unknown(raw) => {
                return Ok(serde_json::json!({ "kind": UNKNOWN_KIND, "data": raw }));
            }
        };
        Ok(serde_json::json!({ "kind": category.as_str(), "data": data }))
    }

    fn from_tagged(raw: serde_json::Value) -> Self {
        if raw.get("kind").and_then(|k| k.as_str()) == Some(UNKNOWN_KIND) {
            if let Some(data) = raw.get("data") {
                return WidgetContent::Unknown(data.clone());
            }
        }

        let category = raw
            .get("kind")
            .and_then(|k| k.as_str())
            .and_then(|k| k.parse::<DataCategory>().ok());

        match (category, raw.get("data")) {
            (Some(category), Some(data)) => {
                match WidgetContent::from_response(category, data.clone()) {
                    WidgetContent::Unknown(_) => WidgetContent::Unknown(raw),
                    typed => typed,
                }
            }
            _ => WidgetContent::Unknown(raw),
        }
    }
}

impl Serialize for WidgetContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tagged()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WidgetContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(WidgetContent::from_tagged(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic() -> TrafficData {
        TrafficData {
            target_url: "https://example.com".to_string(),
            time_duration: "last 7 days".to_string(),
            sessions: 1200,
            bounce_rate: 0.42,
            avg_session_secs: 95,
            daily_sessions: vec![100, 200, 300],
        }
    }

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!("seo-ranking".parse::<DataCategory>().unwrap(), DataCategory::SeoRanking);
        assert_eq!(DataCategory::CompetitorIntel.to_string(), "competitor-intel");
        assert_eq!(DataCategory::Hashtags.endpoint(), "/hashtags");
        assert!("weather".parse::<DataCategory>().is_err());
    }

    #[test]
    fn test_widget_content_tagged_serialization() {
        let content = WidgetContent::TrafficOverview(traffic());
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["kind"], "traffic-overview");
        assert_eq!(json["data"]["sessions"], 1200);

        let back: WidgetContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn test_unknown_kind_is_preserved_verbatim() {
        let raw = serde_json::json!({"kind": "weather", "data": {"celsius": 21}});
        let content: WidgetContent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(content, WidgetContent::Unknown(raw.clone()));

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "unknown", "data": raw}));
        let back: WidgetContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn test_unknown_body_shaped_like_typed_payload_stays_unknown() {
        let hashtags = HashtagData {
            target_url: "https://example.com".to_string(),
            hashtags: vec![],
        };
        let raw = serde_json::json!({"kind": "hashtags", "data": hashtags});
        let content = WidgetContent::Unknown(raw.clone());

        let json = serde_json::to_value(&content).unwrap();
        let back: WidgetContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, WidgetContent::Unknown(raw));
        assert!(back.category().is_none());
    }

    #[test]
    fn test_known_kind_with_foreign_shape_is_unknown() {
        let raw = serde_json::json!({"kind": "backlinks", "data": {"count": "lots"}});
        let content: WidgetContent = serde_json::from_value(raw).unwrap();
        assert!(content.category().is_none());
    }

    #[test]
    fn test_from_response_decodes_typed_payload() {
        let raw = serde_json::to_value(traffic()).unwrap();
        let content = WidgetContent::from_response(DataCategory::TrafficOverview, raw);
        assert_eq!(content.category(), Some(DataCategory::TrafficOverview));
        assert_eq!(content.target_url(), Some("https://example.com"));
    }

    #[test]
    fn test_unknown_target_url_lookup() {
        let content = WidgetContent::Unknown(serde_json::json!({"target_url": "https://a.io"}));
        assert_eq!(content.target_url(), Some("https://a.io"));
    }
}
