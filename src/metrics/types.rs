use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One day's productivity figures, derived from the day's sessions. Raw
/// totals are milliseconds; `productive_hours`/`productive_minutes` are the
/// rounded forms shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetrics {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_spend_ms: u64,
    pub idle_ms: u64,
    pub away_ms: u64,
    pub non_productive_ms: u64,
    pub productive_ms: u64,
    pub productive_hours: String,
    pub productive_minutes: u64,
}

impl DailyMetrics {
    pub fn empty() -> Self {
        Self {
            start_time: None,
            end_time: None,
            total_spend_ms: 0,
            idle_ms: 0,
            away_ms: 0,
            non_productive_ms: 0,
            productive_ms: 0,
            productive_hours: "0.00".to_string(),
            productive_minutes: 0,
        }
    }
}

impl Default for DailyMetrics {
    fn default() -> Self {
        Self::empty()
    }
}
