//! Daily productivity aggregation over closed and in-progress sessions.

mod types;

pub use types::DailyMetrics;

use chrono::{DateTime, Local, Utc};

use crate::db::models::{ActivityStatus, SessionView};

/// The local-calendar day containing `now`, as a UTC interval
/// `[00:00:00.000, 23:59:59.999]`.
pub fn local_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_day = now.with_timezone(&Local).date_naive();
    let start = local_day
        .and_hms_opt(0, 0, 0)
        .and_then(|dt| dt.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    let end = local_day
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|dt| dt.and_local_timezone(Local).latest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    (start, end)
}

/// Aggregate a day's sessions into productivity totals. Sessions still open
/// contribute their partial duration up to `now`. Pure: identical input and
/// `now` yield identical output.
///
/// Productive time is the Active total; idle and away make up the
/// non-productive total, and total spend is the sum of the two.
pub fn compute_daily_metrics(sessions: &[SessionView], now: DateTime<Utc>) -> DailyMetrics {
    if sessions.is_empty() {
        return DailyMetrics::empty();
    }

    let mut idle_ms: u64 = 0;
    let mut away_ms: u64 = 0;
    let mut active_ms: u64 = 0;
    let mut start_time: Option<DateTime<Utc>> = None;
    let mut end_time: Option<DateTime<Utc>> = None;

    for session in sessions {
        let effective_end = session.ended_at.unwrap_or(now);
        let duration_ms = (effective_end - session.started_at).num_milliseconds().max(0) as u64;

        match session.status {
            ActivityStatus::Idle => idle_ms += duration_ms,
            ActivityStatus::Away => away_ms += duration_ms,
            ActivityStatus::Active => active_ms += duration_ms,
        }

        start_time = Some(match start_time {
            Some(earliest) => earliest.min(session.started_at),
            None => session.started_at,
        });
        end_time = Some(match end_time {
            Some(latest) => latest.max(effective_end),
            None => effective_end,
        });
    }

    let non_productive_ms = idle_ms + away_ms;
    let productive_ms = active_ms;
    let total_spend_ms = productive_ms + non_productive_ms;

    DailyMetrics {
        start_time,
        end_time,
        total_spend_ms,
        idle_ms,
        away_ms,
        non_productive_ms,
        productive_ms,
        productive_hours: format!("{:.2}", productive_ms as f64 / 3_600_000.0),
        productive_minutes: productive_ms / 60_000,
    }
}
