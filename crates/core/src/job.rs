//! The job record and its lifecycle.
//!
//! A [`VideoJob`] only changes status through its transition methods,
//! which keep the result/error fields consistent with the status:
//! `result` is present iff the job succeeded and `error` is present iff
//! it failed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::media::{ImagePayload, MediaBlob};
use crate::options::{AspectRatio, InputMode, Resolution, VeoModel};
use crate::scheduling::state_machine;
use crate::types::{JobId, Timestamp};

/// Maximum prompt length, in characters.
pub const MAX_PROMPT_LEN: usize = 4000;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Success and failure end an attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Spec (validated input)
// ---------------------------------------------------------------------------

/// Everything the caller supplies for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub prompt: String,
    pub input_mode: InputMode,
    pub model: VeoModel,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub start_frame: Option<ImagePayload>,
    pub end_frame: Option<ImagePayload>,
}

impl JobSpec {
    /// A text-only spec with default selectors.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            input_mode: InputMode::TextOnly,
            model: VeoModel::default(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            start_frame: None,
            end_frame: None,
        }
    }

    /// Check the spec against its input mode.
    ///
    /// Frames the mode does not use are dropped rather than rejected.
    pub fn validate(mut self) -> Result<Self, CoreError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation("Prompt must not be empty".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_LEN {
            return Err(CoreError::Validation(format!(
                "Prompt must not exceed {MAX_PROMPT_LEN} characters"
            )));
        }
        self.prompt = prompt.to_string();

        if self.input_mode.needs_start_frame() && self.start_frame.is_none() {
            return Err(CoreError::Validation(format!(
                "{} requires a start frame",
                self.input_mode
            )));
        }
        if self.input_mode.needs_end_frame() && self.end_frame.is_none() {
            return Err(CoreError::Validation(format!(
                "{} requires an end frame",
                self.input_mode
            )));
        }
        if !self.input_mode.needs_start_frame() {
            self.start_frame = None;
        }
        if !self.input_mode.needs_end_frame() {
            self.end_frame = None;
        }
        Ok(self)
    }

    /// One spec per prompt, sharing every other field with `template`.
    pub fn batch<I, S>(prompts: I, template: &JobSpec) -> Vec<JobSpec>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        prompts
            .into_iter()
            .map(|prompt| JobSpec {
                prompt: prompt.into(),
                ..template.clone()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Attempt history
// ---------------------------------------------------------------------------

/// Outcome of a finished attempt, kept when a failed job is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoJob {
    pub id: JobId,
    pub prompt: String,
    pub input_mode: InputMode,
    pub model: VeoModel,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub start_frame: Option<ImagePayload>,
    pub end_frame: Option<ImagePayload>,
    status: JobStatus,
    result: Option<MediaBlob>,
    error: Option<String>,
    pub created_at: Timestamp,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    /// Number of times the job has been admitted.
    attempt: u32,
    history: Vec<AttemptRecord>,
}

impl VideoJob {
    /// Create a PENDING job stamped with the current time.
    pub fn new(spec: JobSpec) -> Self {
        Self::new_at(spec, chrono::Utc::now())
    }

    pub fn new_at(spec: JobSpec, created_at: Timestamp) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            prompt: spec.prompt,
            input_mode: spec.input_mode,
            model: spec.model,
            aspect_ratio: spec.aspect_ratio,
            resolution: spec.resolution,
            start_frame: spec.start_frame,
            end_frame: spec.end_frame,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at,
            started_at: None,
            completed_at: None,
            attempt: 0,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result(&self) -> Option<&MediaBlob> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// PENDING -> RUNNING.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now);
        self.attempt += 1;
        Ok(())
    }

    /// RUNNING -> SUCCESS with the produced media.
    pub fn succeed(&mut self, result: MediaBlob, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Success)?;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(now);
        Ok(())
    }

    /// RUNNING -> FAILED with a human-readable message.
    ///
    /// An empty message is replaced so that `error` is never blank on a
    /// failed job.
    pub fn fail(&mut self, message: impl Into<String>, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        let message = message.into();
        self.error = Some(if message.trim().is_empty() {
            "Unknown generation error".to_string()
        } else {
            message
        });
        self.result = None;
        self.completed_at = Some(now);
        Ok(())
    }

    /// FAILED -> PENDING.
    ///
    /// The finished attempt is moved into [`history`](Self::history) and the
    /// per-attempt timestamps are cleared for the next run.
    pub fn retry(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Pending)?;
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            started_at: self.started_at.take(),
            completed_at: self.completed_at.take(),
            error: self.error.take(),
        });
        self.result = None;
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), CoreError> {
        state_machine::validate_transition(self.status, to)?;
        self.status = to;
        Ok(())
    }
}
