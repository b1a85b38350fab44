//! Queue events broadcast by the scheduler.
//!
//! Presentation layers and the worker binary subscribe through
//! [`SchedulerHandle::subscribe`](crate::scheduler::SchedulerHandle::subscribe).

use serde::Serialize;
use veoq_core::types::JobId;

/// Broadcast channel capacity for queue events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// New jobs were appended to the store.
    JobsQueued { job_ids: Vec<JobId> },

    /// A job was admitted and handed to the generator.
    JobStarted { job_id: JobId, attempt: u32 },

    /// A job finished with a video.
    JobSucceeded { job_id: JobId, result_uri: String },

    /// A job failed. `credential` is set when the API key was rejected.
    JobFailed {
        job_id: JobId,
        error: String,
        credential: bool,
    },

    /// The stored API key was dropped after the service rejected it.
    CredentialInvalidated,

    /// The scheduler began admitting jobs.
    SchedulerStarted,

    /// The scheduler stopped admitting jobs. `drained` is set when it
    /// paused itself because nothing was left to do.
    SchedulerPaused { drained: bool },

    /// A failed job went back to PENDING.
    JobRetried { job_id: JobId },

    /// Finished jobs were removed from the store.
    JobsCleared { removed: usize },
}
