use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::payload::{DataCategory, WidgetContent};

/// Unique identifier for a dashboard widget, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetId(pub Uuid);

impl WidgetId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for WidgetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WidgetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The rendering component a widget maps to.
///
/// Serialized as the component name (`"SEORankingWidget"`). Names this build
/// does not know are carried as `Other` so persisted layouts survive upgrades
/// and downgrades.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetKind {
    SeoRanking,
    Backlinks,
    Hashtags,
    CompetitorIntel,
    TrafficOverview,
    Notes,
    Crm,
    Other(String),
}

impl WidgetKind {
    pub fn component_name(&self) -> &str {
        match self {
            WidgetKind::SeoRanking => "SEORankingWidget",
            WidgetKind::Backlinks => "BacklinksWidget",
            WidgetKind::Hashtags => "HashtagWidget",
            WidgetKind::CompetitorIntel => "CompetitorIntelWidget",
            WidgetKind::TrafficOverview => "TrafficOverviewWidget",
            WidgetKind::Notes => "NotesWidget",
            WidgetKind::Crm => "CRMWidget",
            WidgetKind::Other(name) => name,
        }
    }

    /// Data category backing this widget, if it displays fetched data.
    pub fn category(&self) -> Option<DataCategory> {
        match self {
            WidgetKind::SeoRanking => Some(DataCategory::SeoRanking),
            WidgetKind::Backlinks => Some(DataCategory::Backlinks),
            WidgetKind::Hashtags => Some(DataCategory::Hashtags),
            WidgetKind::CompetitorIntel => Some(DataCategory::CompetitorIntel),
            WidgetKind::TrafficOverview => Some(DataCategory::TrafficOverview),
            WidgetKind::Notes | WidgetKind::Crm | WidgetKind::Other(_) => None,
        }
    }

    /// Title used when the user does not provide one.
    pub fn default_title(&self) -> String {
        match self {
            WidgetKind::SeoRanking => "SEO Ranking".to_string(),
            WidgetKind::Backlinks => "Backlinks".to_string(),
            WidgetKind::Hashtags => "Trending Hashtags".to_string(),
            WidgetKind::CompetitorIntel => "Competitor Intelligence".to_string(),
            WidgetKind::TrafficOverview => "Traffic Overview".to_string(),
            WidgetKind::Notes => "Notes".to_string(),
            WidgetKind::Crm => "CRM".to_string(),
            WidgetKind::Other(name) => name.trim_end_matches("Widget").to_string(),
        }
    }
}

impl From<String> for WidgetKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "SEORankingWidget" => WidgetKind::SeoRanking,
            "BacklinksWidget" => WidgetKind::Backlinks,
            "HashtagWidget" => WidgetKind::Hashtags,
            "CompetitorIntelWidget" => WidgetKind::CompetitorIntel,
            "TrafficOverviewWidget" => WidgetKind::TrafficOverview,
            "NotesWidget" => WidgetKind::Notes,
            "CRMWidget" => WidgetKind::Crm,
            _ => WidgetKind::Other(name),
        }
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        kind.component_name().to_string()
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component_name())
    }
}

impl FromStr for WidgetKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(WidgetKind::from(s.to_string()))
    }
}

/// Grid footprint of a widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    #[default]
    Standard,
    Expanded,
}

impl fmt::Display for WidgetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetSize::Standard => write!(f, "standard"),
            WidgetSize::Expanded => write!(f, "expanded"),
        }
    }
}

impl FromStr for WidgetSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(WidgetSize::Standard),
            "expanded" => Ok(WidgetSize::Expanded),
            other => Err(format!("invalid widget size: '{other}'")),
        }
    }
}

/// A user-configurable dashboard panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub title: String,
    #[serde(default)]
    pub size: WidgetSize,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<WidgetContent>,
}

fn default_visible() -> bool {
    true
}

impl Widget {
    pub fn new(kind: WidgetKind, title: Option<String>) -> Self {
        let title = title.unwrap_or_else(|| kind.default_title());
        Self {
            id: WidgetId::new(),
            kind,
            title,
            size: WidgetSize::Standard,
            is_visible: true,
            content: None,
        }
    }
}
