//! In-memory tracker state: the single current session plus the reason
//! countdown attached to it. Owned by `TrackerController` behind one mutex;
//! nothing else mutates it.

use chrono::{DateTime, Utc};

use crate::db::models::{ActivityStatus, NewSession, SessionView, WorkingStatus};

use super::countdown::ReasonCountdown;

/// The open session. At most one exists per tracker; `db_id` is set only
/// after the row has been persisted (early, by a reason recording).
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub db_id: Option<String>,
    pub user_id: String,
    pub status: ActivityStatus,
    pub started_at: DateTime<Utc>,
    pub reason: String,
    pub reason_recorded: bool,
    pub screenshot_path: Option<String>,
}

impl CurrentSession {
    fn open(user_id: &str, status: ActivityStatus, now: DateTime<Utc>) -> Self {
        Self {
            db_id: None,
            user_id: user_id.to_string(),
            status,
            started_at: now,
            reason: String::new(),
            reason_recorded: false,
            screenshot_path: None,
        }
    }

    /// Final row contents for this session, closed at `now`.
    pub fn close_record(&self, now: DateTime<Utc>) -> NewSession {
        let spent_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        NewSession {
            user_id: self.user_id.clone(),
            started_at: self.started_at,
            ended_at: Some(now),
            spent_ms: Some(spent_ms),
            status: self.status,
            working_status: WorkingStatus::for_status(self.status),
            reason: self.reason.clone(),
            screenshot_path: self.screenshot_path.clone(),
            updated_at: now,
        }
    }

    /// Row contents for persisting this session while it is still open
    /// (early reason persist). No end, no spent time.
    pub fn open_record(&self, now: DateTime<Utc>) -> NewSession {
        NewSession {
            user_id: self.user_id.clone(),
            started_at: self.started_at,
            ended_at: None,
            spent_ms: None,
            status: self.status,
            working_status: WorkingStatus::for_status(self.status),
            reason: self.reason.clone(),
            screenshot_path: self.screenshot_path.clone(),
            updated_at: now,
        }
    }

    /// Open-ended view of this session for live queries and metrics.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.db_id.clone(),
            user_id: self.user_id.clone(),
            started_at: self.started_at,
            ended_at: None,
            status: self.status,
            reason: self.reason.clone(),
            screenshot_path: self.screenshot_path.clone(),
        }
    }
}

/// A close that still has to reach storage. When `existing_id` is set the
/// row was already persisted open and only needs finalizing; otherwise the
/// whole record is inserted.
#[derive(Debug, Clone)]
pub struct SessionClose {
    pub existing_id: Option<String>,
    pub record: NewSession,
}

impl SessionClose {
    /// View of the closed session for live queries while its write is still
    /// outstanding.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.existing_id.clone(),
            user_id: self.record.user_id.clone(),
            started_at: self.record.started_at,
            ended_at: self.record.ended_at,
            status: self.record.status,
            reason: self.record.reason.clone(),
            screenshot_path: self.record.screenshot_path.clone(),
        }
    }
}

#[derive(Debug)]
pub struct TrackerState {
    pub current: Option<CurrentSession>,
    pub countdown: ReasonCountdown,
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            current: None,
            countdown: ReasonCountdown::new(),
        }
    }

    /// One transition check. Opens the first session, continues on an
    /// unchanged status, or closes the current session and opens the next
    /// one at the same instant (no gap, no overlap). The countdown is reset
    /// on every transition.
    pub fn apply_status(
        &mut self,
        next: ActivityStatus,
        now: DateTime<Utc>,
        user_id: &str,
    ) -> Option<SessionClose> {
        match &self.current {
            Some(current) if current.status == next => None,
            Some(current) => {
                let close = SessionClose {
                    existing_id: current.db_id.clone(),
                    record: current.close_record(now),
                };
                self.current = Some(CurrentSession::open(user_id, next, now));
                self.countdown.reset();
                Some(close)
            }
            None => {
                self.current = Some(CurrentSession::open(user_id, next, now));
                self.countdown.reset();
                None
            }
        }
    }

    /// Close and drop the current session without opening a successor
    /// (controlled shutdown).
    pub fn take_close(&mut self, now: DateTime<Utc>) -> Option<SessionClose> {
        self.countdown.reset();
        self.current.take().map(|current| SessionClose {
            existing_id: current.db_id.clone(),
            record: current.close_record(now),
        })
    }

    pub fn current_view(&self) -> Option<SessionView> {
        self.current.as_ref().map(CurrentSession::view)
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}
