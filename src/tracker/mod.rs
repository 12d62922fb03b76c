mod classify;
mod controller;
mod countdown;
pub mod events;
mod state;

pub use classify::classify;
pub use controller::TrackerController;
pub use countdown::{CountdownStep, ReasonCountdown};
pub use events::{EventReceiver, EventSender, TrackerEvent};
pub use state::{CurrentSession, SessionClose, TrackerState};
