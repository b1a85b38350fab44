//! Scheduling constants and the job state machine.
//!
//! Lives in `core` (zero internal deps) so both the scheduler and any
//! presentation layer agree on which transitions exist.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// How often the scheduler loop runs an admission check.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Width of the sliding window used for rate limiting job starts.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Default cap on simultaneously running jobs.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default cap on job starts within any [`RATE_WINDOW`].
pub const DEFAULT_MAX_PER_MINUTE: usize = 4;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use crate::error::CoreError;
    use crate::job::JobStatus;

    /// Returns the set of statuses reachable from `from`.
    ///
    /// SUCCESS is final. FAILED only leaves through an explicit retry.
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Pending => &[JobStatus::Running],
            JobStatus::Running => &[JobStatus::Success, JobStatus::Failed],
            JobStatus::Failed => &[JobStatus::Pending],
            JobStatus::Success => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning [`CoreError::InvalidTransition`]
    /// for edges outside the graph.
    pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::state_machine::*;
    use crate::error::CoreError;
    use crate::job::JobStatus::{self, *};

    const ALL: [JobStatus; 4] = [Pending, Running, Success, Failed];

    // -----------------------------------------------------------------------
    // Valid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn pending_to_running() {
        assert!(can_transition(Pending, Running));
    }

    #[test]
    fn running_to_success() {
        assert!(can_transition(Running, Success));
    }

    #[test]
    fn running_to_failed() {
        assert!(can_transition(Running, Failed));
    }

    #[test]
    fn failed_to_pending() {
        assert!(can_transition(Failed, Pending));
    }

    // -----------------------------------------------------------------------
    // Everything else is unreachable
    // -----------------------------------------------------------------------

    #[test]
    fn success_has_no_transitions() {
        assert!(valid_transitions(Success).is_empty());
    }

    #[test]
    fn exactly_four_edges_exist() {
        let edges: usize = ALL.iter().map(|s| valid_transitions(*s).len()).sum();
        assert_eq!(edges, 4);
    }

    #[test]
    fn no_self_transitions() {
        for status in ALL {
            assert!(!can_transition(status, status), "{status} -> {status}");
        }
    }

    #[test]
    fn pending_cannot_skip_running() {
        assert!(!can_transition(Pending, Success));
        assert!(!can_transition(Pending, Failed));
    }

    #[test]
    fn failed_cannot_resume_directly() {
        assert!(!can_transition(Failed, Running));
    }

    // -----------------------------------------------------------------------
    // validate_transition
    // -----------------------------------------------------------------------

    #[test]
    fn validate_transition_ok() {
        assert!(validate_transition(Pending, Running).is_ok());
    }

    #[test]
    fn validate_transition_err() {
        let err = validate_transition(Success, Running).unwrap_err();
        assert_matches!(
            err,
            CoreError::InvalidTransition { from: Success, to: Running }
        );
        assert_eq!(err.to_string(), "Invalid transition: SUCCESS -> RUNNING");
    }
}
