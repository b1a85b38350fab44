//! Failure taxonomy for a single generation attempt.

use std::time::Duration;

use crate::api::VeoApiError;
use crate::messages::OperationError;

/// Service messages that mean the API key is unknown or no longer valid.
const CREDENTIAL_MARKERS: &[&str] = &[
    "Requested entity was not found",
    "API key expired",
    "API_KEY_INVALID",
];

/// Why a generation attempt did not produce a video.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The API key is missing, unknown or expired. The stored key must be
    /// invalidated and a new one selected before further submissions.
    #[error("API key rejected: {0}")]
    Credential(String),

    /// Network or service failure. Recoverable by retrying the job.
    #[error("{0}")]
    Transient(String),

    /// The operation finished without a downloadable video.
    #[error("No video URI returned from the operation")]
    NoResult,

    /// The operation did not finish within the configured poll budget.
    #[error("Operation did not finish after {attempts} polls ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },
}

impl GenerationError {
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Credential(_))
    }

    /// Classify an error reported inside a finished operation.
    pub fn from_operation_error(error: &OperationError) -> Self {
        if is_credential_message(&error.message) {
            Self::Credential(error.message.clone())
        } else {
            Self::Transient(format!(
                "Generation failed ({}): {}",
                error.code, error.message
            ))
        }
    }

    /// Download failures are always transient, whatever the status.
    pub fn download(error: VeoApiError) -> Self {
        Self::Transient(format!("Failed to download video: {error}"))
    }
}

impl From<VeoApiError> for GenerationError {
    fn from(error: VeoApiError) -> Self {
        match &error {
            VeoApiError::ApiError { status: 401, body } => Self::Credential(body.clone()),
            VeoApiError::ApiError { body, .. } if is_credential_message(body) => {
                Self::Credential(body.clone())
            }
            _ => Self::Transient(error.to_string()),
        }
    }
}

fn is_credential_message(message: &str) -> bool {
    CREDENTIAL_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}
