use thiserror::Error;

/// Failures callers need to tell apart. Everything else in the crate
/// propagates as `anyhow::Error` with context.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Configuration rejected at startup; never recoverable at runtime.
    #[error("idle threshold ({idle_threshold_secs}s) must be below away threshold ({away_threshold_secs}s)")]
    MisorderedThresholds {
        idle_threshold_secs: u64,
        away_threshold_secs: u64,
    },

    /// A reason (or screenshot) arrived before the first tick opened a session.
    #[error("no active session")]
    NoActiveSession,
}
