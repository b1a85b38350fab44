//! In-memory job store.
//!
//! An ordered list of [`VideoJob`] records and the single source of truth
//! for job status. Only the scheduler task holds a `JobStore`, so no
//! locking is needed.

use serde::Serialize;
use veoq_core::error::CoreError;
use veoq_core::job::{JobStatus, VideoJob};
use veoq_core::types::JobId;

/// Aggregate counts for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Vec<VideoJob>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new PENDING jobs in arrival order.
    ///
    /// The batch is rejected as a whole if any record is not PENDING or
    /// reuses an identifier already in the store.
    pub fn append(&mut self, jobs: Vec<VideoJob>) -> Result<Vec<JobId>, CoreError> {
        for (i, job) in jobs.iter().enumerate() {
            if job.status() != JobStatus::Pending {
                return Err(CoreError::Conflict(format!(
                    "Job {} is {} and cannot be queued",
                    job.id,
                    job.status()
                )));
            }
            let duplicate = self.get(job.id).is_some()
                || jobs[..i].iter().any(|other| other.id == job.id);
            if duplicate {
                return Err(CoreError::Conflict(format!("Duplicate job id {}", job.id)));
            }
        }

        let ids = jobs.iter().map(|job| job.id).collect();
        self.jobs.extend(jobs);
        Ok(ids)
    }

    /// Apply `f` to the job with `id`. Returns `None` if there is no such job.
    pub fn update<R>(&mut self, id: JobId, f: impl FnOnce(&mut VideoJob) -> R) -> Option<R> {
        self.jobs.iter_mut().find(|job| job.id == id).map(f)
    }

    pub fn get(&self, id: JobId) -> Option<&VideoJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn list(&self) -> &[VideoJob] {
        &self.jobs
    }

    /// The PENDING job to admit next: earliest creation time, with arrival
    /// order breaking ties.
    pub fn next_pending(&self) -> Option<JobId> {
        self.jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status() == JobStatus::Pending)
            .min_by_key(|(index, job)| (job.created_at, *index))
            .map(|(_, job)| job.id)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status() == status).count()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.jobs.len(),
            ..Default::default()
        };
        for job in &self.jobs {
            match job.status() {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Remove every SUCCESS and FAILED job. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| !job.status().is_terminal());
        before - self.jobs.len()
    }
}
