use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{
        parse_datetime, parse_optional_datetime, parse_status, parse_working_status, to_i64,
        to_u64,
    },
    models::{ActivitySession, NewSession},
    Database,
};

fn row_to_session(row: &Row) -> Result<ActivitySession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let status: String = row.get("status")?;
    let working_status: String = row.get("working_status")?;
    let spent_ms: Option<i64> = row.get("spent_ms")?;

    Ok(ActivitySession {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        spent_ms: spent_ms.map(|ms| to_u64(ms, "spent_ms")).transpose()?,
        status: parse_status(&status)?,
        working_status: parse_working_status(&working_status)?,
        reason: row.get("reason")?,
        screenshot_path: row.get("screenshot_path")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Insert a session row and return the id assigned to it.
    pub async fn create_session(&self, session: &NewSession) -> Result<String> {
        let record = session.clone();
        let id = Uuid::new_v4().to_string();
        let id_for_caller = id.clone();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, started_at, ended_at, spent_ms, status, working_status, reason, screenshot_path, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id,
                    record.user_id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.spent_ms.map(to_i64).transpose()?,
                    record.status.as_str(),
                    record.working_status.as_str(),
                    record.reason,
                    record.screenshot_path,
                    record.started_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(id_for_caller)
    }

    /// Partial update: set the idle reason without touching any other field.
    pub async fn update_session_reason(
        &self,
        session_id: &str,
        reason: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        let reason = reason.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET reason = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![reason, updated_at.to_rfc3339(), session_id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow::anyhow!("Session not found"));
            }

            Ok(())
        })
        .await
    }

    /// Finalize a row that was persisted while still open (early reason
    /// persist). Also writes the latest reason and screenshot path so the
    /// row matches the in-memory session at close time.
    pub async fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        spent_ms: u64,
        reason: &str,
        screenshot_path: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        let reason = reason.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET ended_at = ?1,
                     spent_ms = ?2,
                     reason = ?3,
                     screenshot_path = ?4,
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    ended_at.to_rfc3339(),
                    to_i64(spent_ms)?,
                    reason,
                    screenshot_path,
                    updated_at.to_rfc3339(),
                    session_id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow::anyhow!("Session not found"));
            }

            Ok(())
        })
        .await
    }

    /// All sessions for a user whose start falls inside `[start, end]`,
    /// oldest first.
    pub async fn find_sessions_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivitySession>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, started_at, ended_at, spent_ms, status, working_status, reason, screenshot_path, created_at, updated_at
                 FROM sessions
                 WHERE user_id = ?1 AND started_at >= ?2 AND started_at <= ?3
                 ORDER BY started_at ASC",
            )?;

            let mut rows = stmt.query(params![
                user_id,
                start.to_rfc3339(),
                end.to_rfc3339()
            ])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Rows left open by a previous run (crash before close).
    pub async fn find_open_sessions(&self, user_id: &str) -> Result<Vec<ActivitySession>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, started_at, ended_at, spent_ms, status, working_status, reason, screenshot_path, created_at, updated_at
                 FROM sessions
                 WHERE user_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }
}
