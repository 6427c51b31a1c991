//! Usage events recorded for webhook calls and synced in batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a webhook attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageOutcome {
    Live,
    Disabled,
    Failed,
}

/// One webhook attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub endpoint: String,
    pub outcome: UsageOutcome,
    pub latency_ms: u64,
    pub at: DateTime<Utc>,
}
