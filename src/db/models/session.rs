//! Session-related data models.
//!
//! An activity session is a contiguous interval during which the user's
//! classified presence status did not change. A status change always closes
//! the current session and opens a new one; the `status` of a persisted row
//! never mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityStatus {
    Active,
    Idle,
    Away,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Active => "Active",
            ActivityStatus::Idle => "Idle",
            ActivityStatus::Away => "Away",
        }
    }
}

/// Working/Break split derived from the activity status at persist time.
/// Active counts as working; Idle and Away count as break.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WorkingStatus {
    Working,
    Break,
}

impl WorkingStatus {
    pub fn for_status(status: ActivityStatus) -> Self {
        match status {
            ActivityStatus::Active => WorkingStatus::Working,
            ActivityStatus::Idle | ActivityStatus::Away => WorkingStatus::Break,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkingStatus::Working => "Working",
            WorkingStatus::Break => "Break",
        }
    }
}

/// A persisted session row. `ended_at` is `None` only for rows persisted
/// early by a reason recording; `spent_ms` is set iff `ended_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySession {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub spent_ms: Option<u64>,
    pub status: ActivityStatus,
    pub working_status: WorkingStatus,
    pub reason: String,
    pub screenshot_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session fields known before an id exists. `create_session` assigns the id
/// on first persistence.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub spent_ms: Option<u64>,
    pub status: ActivityStatus,
    pub working_status: WorkingStatus,
    pub reason: String,
    pub screenshot_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Read-side view of a session, persisted or not. The live current session
/// is surfaced through this shape with `id = None` and `ended_at = None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Option<String>,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ActivityStatus,
    pub reason: String,
    pub screenshot_path: Option<String>,
}

impl From<ActivitySession> for SessionView {
    fn from(session: ActivitySession) -> Self {
        Self {
            id: Some(session.id),
            user_id: session.user_id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            status: session.status,
            reason: session.reason,
            screenshot_path: session.screenshot_path,
        }
    }
}
