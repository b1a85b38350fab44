use veoq_core::error::CoreError;

/// Errors returned by [`SchedulerHandle`](crate::scheduler::SchedulerHandle).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The scheduler task has exited and no longer accepts commands.
    #[error("Scheduler is not running")]
    Stopped,

    /// The command was rejected by the job store.
    #[error(transparent)]
    Core(#[from] CoreError),
}
