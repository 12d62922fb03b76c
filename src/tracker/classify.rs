use crate::db::models::ActivityStatus;

/// Map elapsed idle seconds onto a presence status. Pure and total; the
/// `idle < away` threshold ordering is enforced by `TrackerConfig::validate`
/// before a tracker ever runs.
pub fn classify(
    idle_secs: u64,
    idle_threshold_secs: u64,
    away_threshold_secs: u64,
) -> ActivityStatus {
    if idle_secs >= away_threshold_secs {
        ActivityStatus::Away
    } else if idle_secs >= idle_threshold_secs {
        ActivityStatus::Idle
    } else {
        ActivityStatus::Active
    }
}
