pub mod session;

pub use session::{ActivitySession, ActivityStatus, NewSession, SessionView, WorkingStatus};
