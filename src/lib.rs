//! worktrack: a work presence tracking engine.
//!
//! Samples an idle-duration signal once per second, classifies it into
//! Active / Idle / Away, records each stretch of unchanged status as a
//! session, prompts for an idle reason after a short countdown, and
//! aggregates the day's sessions into productivity metrics.
//!
//! The host application supplies the idle signal (an [`IdleSource`]), picks
//! a database path, and consumes [`TrackerEvent`]s for its UI. Everything
//! else lives here.

pub mod config;
pub mod db;
pub mod error;
pub mod idle;
pub mod metrics;
pub mod tracker;

pub use config::TrackerConfig;
pub use db::models::{ActivitySession, ActivityStatus, NewSession, SessionView, WorkingStatus};
pub use db::Database;
pub use error::TrackerError;
pub use idle::IdleSource;
pub use metrics::{compute_daily_metrics, local_day_window, DailyMetrics};
pub use tracker::{classify, TrackerController, TrackerEvent};
