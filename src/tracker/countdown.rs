//! Countdown that precedes the idle reason prompt.
//!
//! Scoped to the lifetime of one Idle session: armed on the first idle tick
//! with no reason recorded, decremented once per tick, fires the prompt
//! exactly once when it hits zero, then stays quiet until reset by a session
//! transition or a recorded reason.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCountdown {
    Inactive,
    Counting(u32),
    /// Prompt already fired for this idle episode; do not re-arm.
    Fired,
}

/// What one countdown step produced. `remaining` is always emitted as a
/// countdown update; `prompt` is set on the step that reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownStep {
    pub remaining: u32,
    pub prompt: bool,
}

impl ReasonCountdown {
    pub fn new() -> Self {
        ReasonCountdown::Inactive
    }

    pub fn reset(&mut self) {
        *self = ReasonCountdown::Inactive;
    }

    /// Advance one tick. Only called while the current session is Idle with
    /// no reason recorded; arms itself from `countdown_secs` on the first
    /// such tick.
    pub fn step(&mut self, countdown_secs: u32) -> Option<CountdownStep> {
        let remaining = match *self {
            ReasonCountdown::Inactive => countdown_secs,
            ReasonCountdown::Counting(remaining) => remaining,
            ReasonCountdown::Fired => return None,
        };

        let next = remaining.saturating_sub(1);
        if next == 0 {
            *self = ReasonCountdown::Fired;
            Some(CountdownStep {
                remaining: 0,
                prompt: true,
            })
        } else {
            *self = ReasonCountdown::Counting(next);
            Some(CountdownStep {
                remaining: next,
                prompt: false,
            })
        }
    }
}

impl Default for ReasonCountdown {
    fn default() -> Self {
        Self::new()
    }
}
