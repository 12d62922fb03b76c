use anyhow::Result;

/// Host-side source of the idle signal: elapsed seconds since the last user
/// input. Read once per tick. A failed read degrades to 0 (Active) for that
/// tick; it never stops the scheduler.
pub trait IdleSource: Send + Sync {
    fn idle_seconds(&self) -> Result<u64>;
}

impl<F> IdleSource for F
where
    F: Fn() -> Result<u64> + Send + Sync,
{
    fn idle_seconds(&self) -> Result<u64> {
        self()
    }
}
