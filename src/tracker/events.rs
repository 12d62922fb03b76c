//! Outbound notifications for the UI layer. Delivery is fire-and-forget over
//! an unbounded channel; the tracker never blocks on a slow or absent
//! consumer.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::db::models::SessionView;
use crate::metrics::DailyMetrics;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackerEvent {
    CountdownTick { remaining: u32 },
    ReasonPromptRequested,
    MetricsUpdated(DailyMetrics),
    SessionClosed(SessionView),
}

pub type EventSender = mpsc::UnboundedSender<TrackerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TrackerEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
