use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Sales pipeline stage of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl PipelineStage {
    pub fn is_closed(&self) -> bool {
        matches!(self, PipelineStage::Won | PipelineStage::Lost)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Lead => write!(f, "lead"),
            PipelineStage::Qualified => write!(f, "qualified"),
            PipelineStage::Proposal => write!(f, "proposal"),
            PipelineStage::Negotiation => write!(f, "negotiation"),
            PipelineStage::Won => write!(f, "won"),
            PipelineStage::Lost => write!(f, "lost"),
        }
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lead" => Ok(PipelineStage::Lead),
            "qualified" => Ok(PipelineStage::Qualified),
            "proposal" => Ok(PipelineStage::Proposal),
            "negotiation" => Ok(PipelineStage::Negotiation),
            "won" => Ok(PipelineStage::Won),
            "lost" => Ok(PipelineStage::Lost),
            other => Err(format!("invalid pipeline stage: '{other}'")),
        }
    }
}

/// A CRM contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub stage: PipelineStage,
    #[serde(default)]
    pub deal_value: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_contacted: Option<DateTime<Utc>>,
}

/// Input for creating a contact.
#[derive(Debug, Clone, Default)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub deal_value: f64,
}

/// Per-stage totals of the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTotals {
    pub contacts: usize,
    pub deal_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse() {
        assert_eq!("Won".parse::<PipelineStage>().unwrap(), PipelineStage::Won);
        assert!(PipelineStage::Lost.is_closed());
        assert!(!PipelineStage::Proposal.is_closed());
        assert!("cold".parse::<PipelineStage>().is_err());
    }
}
