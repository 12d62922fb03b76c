use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::TrackerConfig,
    db::models::{ActivityStatus, SessionView},
    db::Database,
    error::TrackerError,
    idle::IdleSource,
    metrics::{compute_daily_metrics, local_day_window, DailyMetrics},
};

use super::{
    classify::classify,
    events::{EventSender, TrackerEvent},
    state::{SessionClose, TrackerState},
};

struct TickerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the session state machine. One instance owns the current session
/// and the reason countdown; every mutation happens inside `tick`,
/// `record_reason`, `attach_screenshot` or `shutdown` under the state lock,
/// so ticks and external calls always observe a consistent snapshot.
#[derive(Clone)]
pub struct TrackerController {
    state: Arc<Mutex<TrackerState>>,
    db: Database,
    config: TrackerConfig,
    idle: Arc<dyn IdleSource>,
    events: EventSender,
    ticker: Arc<Mutex<Option<TickerHandle>>>,
    /// Closed sessions not yet confirmed in storage, in transition order.
    /// Entries leave the queue only once their write succeeds; until then
    /// live queries count them as if written.
    pending: Arc<Mutex<Vec<SessionClose>>>,
}

impl TrackerController {
    pub fn new(
        db: Database,
        config: TrackerConfig,
        idle: Arc<dyn IdleSource>,
        events: EventSender,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            state: Arc::new(Mutex::new(TrackerState::new())),
            db,
            config,
            idle,
            events,
            ticker: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Close rows a previous run left open (crash before close), using their
    /// last update as the end time.
    pub async fn recover(&self, now: DateTime<Utc>) -> Result<()> {
        let open = self.db.find_open_sessions(&self.config.user_id).await?;
        for row in open {
            let ended_at = row.updated_at.max(row.started_at);
            let spent_ms = (ended_at - row.started_at).num_milliseconds().max(0) as u64;
            warn!(
                "Recovered open session {} from a previous run; closing at {}",
                row.id, ended_at
            );
            self.db
                .close_session(
                    &row.id,
                    ended_at,
                    spent_ms,
                    &row.reason,
                    row.screenshot_path.clone(),
                    now,
                )
                .await?;
        }
        Ok(())
    }

    /// One scheduler tick: read the idle signal, classify it, apply the
    /// transition rule, then advance the reason countdown. Persistence of a
    /// closed session completes before this returns, so ticks never overlap
    /// a write from the previous one.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        let idle_secs = match self.idle.idle_seconds() {
            Ok(secs) => secs,
            Err(err) => {
                warn!("Idle source read failed, treating tick as active: {err:#}");
                0
            }
        };

        let next = classify(
            idle_secs,
            self.config.idle_threshold_secs,
            self.config.away_threshold_secs,
        );

        let (had_close, countdown_step) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let close = state.apply_status(next, now, &self.config.user_id);

            let awaiting_reason = state
                .current
                .as_ref()
                .map(|current| current.status == ActivityStatus::Idle && !current.reason_recorded)
                .unwrap_or(false);
            let countdown_step = if awaiting_reason {
                state.countdown.step(self.config.countdown_secs)
            } else {
                state.countdown.reset();
                None
            };

            // Queue the close before the state lock drops so a concurrent
            // live query never sees the transition half-applied.
            let had_close = match close {
                Some(close) => {
                    self.pending.lock().await.push(close);
                    true
                }
                None => false,
            };

            (had_close, countdown_step)
        };

        if had_close {
            self.flush_closes(None).await;
        }

        if let Some(step) = countdown_step {
            self.emit(TrackerEvent::CountdownTick {
                remaining: step.remaining,
            });
            if step.prompt {
                self.emit(TrackerEvent::ReasonPromptRequested);
            }
        }

        Ok(())
    }

    /// Attach the user's idle reason to the current session. Persists the
    /// session immediately: as a fresh open row when it has no id yet, or as
    /// a reason-only update when it does. Either way the countdown is
    /// cancelled and no further prompt fires for this session.
    pub async fn record_reason(&self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let current = state
            .current
            .as_mut()
            .ok_or(TrackerError::NoActiveSession)?;

        if current.status == ActivityStatus::Active {
            bail!("a reason only applies to an idle or away session");
        }

        current.reason = reason.to_string();
        current.reason_recorded = true;
        state.countdown.reset();

        match current.db_id.clone() {
            Some(id) => self
                .db
                .update_session_reason(&id, reason, now)
                .await
                .context("failed to update session reason")?,
            None => {
                let record = current.open_record(now);
                let id = self
                    .db
                    .create_session(&record)
                    .await
                    .context("failed to persist session with reason")?;
                current.db_id = Some(id);
            }
        }

        Ok(())
    }

    /// Record a screenshot path captured by the host while the current
    /// session is Active. Stored with the session when it is persisted.
    pub async fn attach_screenshot(&self, path: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        let current = guard
            .current
            .as_mut()
            .ok_or(TrackerError::NoActiveSession)?;

        if current.status != ActivityStatus::Active {
            bail!("screenshots only attach to an active session");
        }

        current.screenshot_path = Some(path.to_string());
        Ok(())
    }

    /// All of the user's sessions for the local day containing `now`:
    /// persisted rows, closes still waiting on storage, and an open-ended
    /// view of the live session.
    pub async fn sessions_today(&self, now: DateTime<Utc>) -> Result<Vec<SessionView>> {
        let guard = self.state.lock().await;
        let pending = self.pending.lock().await;
        let (day_start, day_end) = local_day_window(now);
        let stored = self
            .db
            .find_sessions_in_window(&self.config.user_id, day_start, day_end)
            .await?;

        let mut views: Vec<SessionView> = stored.into_iter().map(SessionView::from).collect();

        // Queued closes count as if written. One persisted early by a
        // reason recording is still an open row in the table; the queued
        // record supersedes it.
        for close in pending.iter() {
            if close.record.started_at < day_start || close.record.started_at > day_end {
                continue;
            }
            if let Some(id) = &close.existing_id {
                views.retain(|view| view.id.as_deref() != Some(id.as_str()));
            }
            views.push(close.view());
        }

        if let Some(current) = guard.current_view() {
            // An early reason persist leaves the live session in the table
            // as an open row; prefer the in-memory view of it.
            if let Some(id) = current.id.clone() {
                views.retain(|view| view.id.as_deref() != Some(id.as_str()));
            }
            views.push(current);
        }

        Ok(views)
    }

    pub async fn metrics_snapshot(&self, now: DateTime<Utc>) -> Result<DailyMetrics> {
        let sessions = self.sessions_today(now).await?;
        Ok(compute_daily_metrics(&sessions, now))
    }

    /// Spawn the fixed-rate tick loop. Ticks are strictly serialized: each
    /// iteration awaits the full tick, including any persistence it
    /// triggered, before the interval is polled again.
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.ticker.lock().await;
        if guard.is_some() {
            bail!("tracker already running");
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let controller = self.clone();
        let handle = tokio::spawn(async move { controller.run_loop(loop_token).await });

        *guard = Some(TickerHandle { token, handle });
        Ok(())
    }

    async fn run_loop(self, cancel: CancellationToken) {
        let mut interval = time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u32 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick(Utc::now()).await {
                        error!("Tick failed: {err:#}");
                    }

                    ticks = ticks.wrapping_add(1);
                    if self.config.metrics_every_ticks > 0
                        && ticks % self.config.metrics_every_ticks == 0
                    {
                        match self.metrics_snapshot(Utc::now()).await {
                            Ok(metrics) => self.emit(TrackerEvent::MetricsUpdated(metrics)),
                            Err(err) => warn!("Metrics computation failed: {err:#}"),
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Tracker loop shutting down");
                    break;
                }
            }
        }
    }

    /// Controlled stop: halt the tick loop, then close the current session
    /// at `now` exactly as a normal transition would, completing the write
    /// before returning.
    pub async fn shutdown(&self, now: DateTime<Utc>) -> Result<()> {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.token.cancel();
            ticker
                .handle
                .await
                .context("tracker loop task failed to join")?;
        }

        let close = self.state.lock().await.take_close(now);
        self.flush_closes(close).await;
        Ok(())
    }

    /// Write queued closes in transition order. A close leaves the queue
    /// only once its write succeeds, so live queries keep counting it
    /// through a storage outage; a failed write stops the pass and leaves
    /// everything behind it queued for the next transition.
    async fn flush_closes(&self, new_close: Option<SessionClose>) {
        let mut pending = self.pending.lock().await;
        if let Some(close) = new_close {
            pending.push(close);
        }

        while let Some(close) = pending.first().cloned() {
            match self.write_close(&close).await {
                Ok(view) => {
                    pending.remove(0);
                    self.emit(TrackerEvent::SessionClosed(view));
                }
                Err(err) => {
                    error!("Failed to persist closed session, will retry on the next transition: {err:#}");
                    break;
                }
            }
        }
    }

    async fn write_close(&self, close: &SessionClose) -> Result<SessionView> {
        let record = &close.record;
        let id = match &close.existing_id {
            Some(id) => {
                let ended_at = record.ended_at.context("close record missing end time")?;
                let spent_ms = record.spent_ms.context("close record missing spent time")?;
                self.db
                    .close_session(
                        id,
                        ended_at,
                        spent_ms,
                        &record.reason,
                        record.screenshot_path.clone(),
                        record.updated_at,
                    )
                    .await?;
                id.clone()
            }
            None => self.db.create_session(record).await?,
        };

        Ok(SessionView {
            id: Some(id),
            user_id: record.user_id.clone(),
            started_at: record.started_at,
            ended_at: record.ended_at,
            status: record.status,
            reason: record.reason.clone(),
            screenshot_path: record.screenshot_path.clone(),
        })
    }

    fn emit(&self, event: TrackerEvent) {
        // Fire-and-forget; a missing consumer is not an error.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use anyhow::anyhow;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::TempDir;

    use super::*;
    use crate::tracker::events;

    /// Replays a scripted sequence of idle readings, then repeats the last
    /// one. An empty script reads as always-active.
    struct ScriptedIdle {
        readings: StdMutex<VecDeque<u64>>,
        last: StdMutex<u64>,
    }

    impl ScriptedIdle {
        fn new(readings: impl IntoIterator<Item = u64>) -> Self {
            Self {
                readings: StdMutex::new(readings.into_iter().collect()),
                last: StdMutex::new(0),
            }
        }
    }

    impl IdleSource for ScriptedIdle {
        fn idle_seconds(&self) -> Result<u64> {
            let mut readings = self.readings.lock().expect("script lock");
            match readings.pop_front() {
                Some(value) => {
                    *self.last.lock().expect("last lock") = value;
                    Ok(value)
                }
                None => Ok(*self.last.lock().expect("last lock")),
            }
        }
    }

    struct FailingIdle;

    impl IdleSource for FailingIdle {
        fn idle_seconds(&self) -> Result<u64> {
            Err(anyhow!("idle probe unavailable"))
        }
    }

    fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::new(dir.path().join("worktrack.sqlite3")).expect("open db");
        (dir, db)
    }

    fn controller_with(
        db: &Database,
        idle: Arc<dyn IdleSource>,
    ) -> (TrackerController, events::EventReceiver) {
        let (tx, rx) = events::channel();
        let config = TrackerConfig {
            user_id: "u1".into(),
            ..TrackerConfig::default()
        };
        let controller =
            TrackerController::new(db.clone(), config, idle, tx).expect("controller");
        (controller, rx)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn drain(rx: &mut events::EventReceiver) -> Vec<TrackerEvent> {
        let mut collected = Vec::new();
        while let Ok(event) = rx.try_recv() {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn fifty_nine_active_ticks_then_idle_prompts_exactly_once() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new((0..59).map(|_| 0).chain(60..80));
        let (controller, mut rx) = controller_with(&db, Arc::new(idle));

        // 59 active ticks, then 20 idle ticks.
        for i in 0..79 {
            controller
                .tick(t0() + ChronoDuration::seconds(i))
                .await
                .expect("tick");
        }

        let events = drain(&mut rx);

        let closed: Vec<&SessionView> = events
            .iter()
            .filter_map(|event| match event {
                TrackerEvent::SessionClosed(view) => Some(view),
                _ => None,
            })
            .collect();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].status, ActivityStatus::Active);
        assert_eq!(closed[0].started_at, t0());
        assert_eq!(closed[0].ended_at, Some(t0() + ChronoDuration::seconds(59)));

        let ticks: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                TrackerEvent::CountdownTick { remaining } => Some(*remaining),
                _ => None,
            })
            .collect();
        let expected: Vec<u32> = (0..15).rev().collect();
        assert_eq!(ticks, expected);

        let prompts = events
            .iter()
            .filter(|event| matches!(event, TrackerEvent::ReasonPromptRequested))
            .count();
        assert_eq!(prompts, 1);

        // The closed Active session carries exactly 59 seconds.
        let (day_start, day_end) = local_day_window(t0());
        let stored = db
            .find_sessions_in_window("u1", day_start, day_end)
            .await
            .expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].spent_ms, Some(59_000));

        // Invariant: at most one open session, and it lives only in memory.
        assert!(db.find_open_sessions("u1").await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn reason_on_unpersisted_session_creates_one_row() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([60, 61, 0]);
        let (controller, mut rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");
        controller
            .record_reason("bio break", t0() + ChronoDuration::seconds(1))
            .await
            .expect("record reason");

        let open = db.find_open_sessions("u1").await.expect("query");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].reason, "bio break");
        assert_eq!(open[0].ended_at, None);
        let persisted_id = open[0].id.clone();

        // No countdown activity once the reason is in.
        drain(&mut rx);
        controller
            .tick(t0() + ChronoDuration::seconds(1))
            .await
            .expect("tick");
        let quiet = drain(&mut rx);
        assert!(quiet
            .iter()
            .all(|event| !matches!(event, TrackerEvent::CountdownTick { .. })));

        // The transition finalizes the same row instead of inserting another.
        controller
            .tick(t0() + ChronoDuration::seconds(2))
            .await
            .expect("tick");
        let (day_start, day_end) = local_day_window(t0());
        let stored = db
            .find_sessions_in_window("u1", day_start, day_end)
            .await
            .expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, persisted_id);
        assert_eq!(stored[0].reason, "bio break");
        assert_eq!(stored[0].ended_at, Some(t0() + ChronoDuration::seconds(2)));
        assert_eq!(stored[0].spent_ms, Some(2_000));
    }

    #[tokio::test]
    async fn reason_on_persisted_session_updates_by_id() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([60]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");
        controller
            .record_reason("first", t0() + ChronoDuration::seconds(1))
            .await
            .expect("record reason");
        controller
            .record_reason("second thoughts", t0() + ChronoDuration::seconds(2))
            .await
            .expect("record reason again");

        // Last write wins on one and the same row.
        let open = db.find_open_sessions("u1").await.expect("query");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].reason, "second thoughts");
    }

    #[tokio::test]
    async fn reason_without_session_reports_no_active_session() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        let err = controller
            .record_reason("too early", t0())
            .await
            .expect_err("must fail");
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::NoActiveSession)
        );
    }

    #[tokio::test]
    async fn reason_is_rejected_while_active() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([0]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");
        assert!(controller
            .record_reason("not idle", t0())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn transitions_keep_sessions_contiguous() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([0, 60, 300, 0]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        for i in 0..4 {
            controller
                .tick(t0() + ChronoDuration::seconds(i * 10))
                .await
                .expect("tick");
        }

        let sessions = controller
            .sessions_today(t0() + ChronoDuration::seconds(30))
            .await
            .expect("sessions");
        assert_eq!(sessions.len(), 4);
        for pair in sessions.windows(2) {
            assert_eq!(pair[0].ended_at, Some(pair[1].started_at));
        }
        assert_eq!(sessions[3].ended_at, None);
        assert_eq!(sessions[3].status, ActivityStatus::Active);
    }

    #[tokio::test]
    async fn metrics_snapshot_counts_the_live_session() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([0, 60]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");
        controller
            .tick(t0() + ChronoDuration::minutes(10))
            .await
            .expect("tick");

        let metrics = controller
            .metrics_snapshot(t0() + ChronoDuration::minutes(15))
            .await
            .expect("metrics");
        assert_eq!(metrics.productive_minutes, 10);
        assert_eq!(metrics.idle_ms, 5 * 60_000);
        assert_eq!(metrics.total_spend_ms, 15 * 60_000);
        assert_eq!(metrics.end_time, Some(t0() + ChronoDuration::minutes(15)));
    }

    #[tokio::test]
    async fn idle_source_failure_degrades_to_active() {
        let (_dir, db) = test_db();
        let (controller, _rx) = controller_with(&db, Arc::new(FailingIdle));

        controller.tick(t0()).await.expect("tick");
        let sessions = controller.sessions_today(t0()).await.expect("sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, ActivityStatus::Active);
    }

    #[tokio::test]
    async fn failed_close_write_stays_in_live_totals_and_lands_on_retry() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([0, 60, 300]);
        let (controller, mut rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");

        // Take storage away before the first transition tries to write.
        let raw = rusqlite::Connection::open(db.path()).expect("raw connection");
        raw.execute_batch("DROP TABLE sessions").expect("drop table");

        controller
            .tick(t0() + ChronoDuration::seconds(10))
            .await
            .expect("tick");

        // The closed Active session is queued, not stored, but live queries
        // and totals still count it in full.
        let live = controller
            .sessions_today(t0() + ChronoDuration::seconds(10))
            .await
            .expect("sessions");
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].status, ActivityStatus::Active);
        assert_eq!(live[0].ended_at, Some(t0() + ChronoDuration::seconds(10)));

        let metrics = controller
            .metrics_snapshot(t0() + ChronoDuration::seconds(10))
            .await
            .expect("metrics");
        assert_eq!(metrics.productive_ms, 10_000);
        assert_eq!(metrics.start_time, Some(t0()));

        let closed_during_outage = drain(&mut rx)
            .iter()
            .filter(|event| matches!(event, TrackerEvent::SessionClosed(_)))
            .count();
        assert_eq!(closed_during_outage, 0);

        // Storage comes back; the next transition flushes both closes in
        // transition order.
        raw.execute_batch(include_str!("../db/schemas/schema_v1.sql"))
            .expect("recreate table");
        controller
            .tick(t0() + ChronoDuration::seconds(20))
            .await
            .expect("tick");

        let (day_start, day_end) = local_day_window(t0());
        let stored = db
            .find_sessions_in_window("u1", day_start, day_end)
            .await
            .expect("query");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].status, ActivityStatus::Active);
        assert_eq!(stored[0].spent_ms, Some(10_000));
        assert_eq!(stored[1].status, ActivityStatus::Idle);
        assert_eq!(stored[1].started_at, stored[0].ended_at.expect("ended"));

        let closed_after_recovery: Vec<ActivityStatus> = drain(&mut rx)
            .iter()
            .filter_map(|event| match event {
                TrackerEvent::SessionClosed(view) => Some(view.status),
                _ => None,
            })
            .collect();
        assert_eq!(
            closed_after_recovery,
            vec![ActivityStatus::Active, ActivityStatus::Idle]
        );
    }

    #[tokio::test]
    async fn shutdown_closes_the_current_session() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([0]);
        let (controller, mut rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");
        controller
            .shutdown(t0() + ChronoDuration::seconds(5))
            .await
            .expect("shutdown");

        let (day_start, day_end) = local_day_window(t0());
        let stored = db
            .find_sessions_in_window("u1", day_start, day_end)
            .await
            .expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].spent_ms, Some(5_000));
        assert!(db.find_open_sessions("u1").await.expect("query").is_empty());

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|event| matches!(event, TrackerEvent::SessionClosed(_))));
    }

    #[tokio::test]
    async fn recover_finalizes_stale_open_rows() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([60]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        // Simulate a previous run that persisted an open row and crashed.
        controller.tick(t0()).await.expect("tick");
        controller
            .record_reason("stale", t0() + ChronoDuration::seconds(30))
            .await
            .expect("record reason");
        assert_eq!(db.find_open_sessions("u1").await.expect("query").len(), 1);

        let (fresh, _rx2) = controller_with(&db, Arc::new(ScriptedIdle::new([])));
        fresh
            .recover(t0() + ChronoDuration::minutes(5))
            .await
            .expect("recover");

        assert!(db.find_open_sessions("u1").await.expect("query").is_empty());
        let (day_start, day_end) = local_day_window(t0());
        let stored = db
            .find_sessions_in_window("u1", day_start, day_end)
            .await
            .expect("query");
        assert_eq!(stored.len(), 1);
        // Closed at its last update, not at recovery time.
        assert_eq!(stored[0].ended_at, Some(t0() + ChronoDuration::seconds(30)));
        assert_eq!(stored[0].spent_ms, Some(30_000));
    }

    #[tokio::test]
    async fn screenshot_attaches_only_while_active() {
        let (_dir, db) = test_db();
        let idle = ScriptedIdle::new([0, 60]);
        let (controller, _rx) = controller_with(&db, Arc::new(idle));

        controller.tick(t0()).await.expect("tick");
        controller
            .attach_screenshot("/tmp/shot-001.png")
            .await
            .expect("attach");

        // The transition closes the Active session with the path included.
        controller
            .tick(t0() + ChronoDuration::seconds(10))
            .await
            .expect("tick");
        let (day_start, day_end) = local_day_window(t0());
        let stored = db
            .find_sessions_in_window("u1", day_start, day_end)
            .await
            .expect("query");
        assert_eq!(
            stored[0].screenshot_path.as_deref(),
            Some("/tmp/shot-001.png")
        );

        // Now Idle: attaching is refused.
        assert!(controller.attach_screenshot("/tmp/shot-002.png").await.is_err());
    }

    #[tokio::test]
    async fn ticker_loop_runs_and_shuts_down_cleanly() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (_dir, db) = test_db();
        let (tx, mut rx) = events::channel();
        let config = TrackerConfig {
            user_id: "u1".into(),
            tick_interval_ms: 10,
            ..TrackerConfig::default()
        };
        let controller = TrackerController::new(
            db.clone(),
            config,
            Arc::new(ScriptedIdle::new([])),
            tx,
        )
        .expect("controller");

        controller.start().await.expect("start");
        assert!(controller.start().await.is_err(), "double start must fail");

        tokio::time::sleep(Duration::from_millis(80)).await;
        controller.shutdown(Utc::now()).await.expect("shutdown");

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|event| matches!(event, TrackerEvent::MetricsUpdated(_))));
        assert!(events
            .iter()
            .any(|event| matches!(event, TrackerEvent::SessionClosed(_))));
    }
}
