//! Typed request and response bodies for the Veo REST API.
//!
//! Only the fields the queue needs are modelled. Unknown fields in
//! responses are ignored.

use base64::engine::general_purpose::STANDARD as base64_engine;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use veoq_core::job::VideoJob;
use veoq_core::media::ImagePayload;
use veoq_core::options::InputMode;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Body of `POST /v1beta/models/{model}:predictLongRunning`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateVideosRequest {
    pub instances: Vec<GenerateInstance>,
    pub parameters: GenerateParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInstance {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame: Option<InlineImage>,
}

/// An image sent inline as base64.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

impl From<&ImagePayload> for InlineImage {
    fn from(image: &ImagePayload) -> Self {
        Self {
            bytes_base64_encoded: base64_engine.encode(&image.data),
            mime_type: image.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParameters {
    pub aspect_ratio: &'static str,
    pub resolution: &'static str,
    pub sample_count: u32,
}

impl GenerateVideosRequest {
    /// Build the request for a job.
    ///
    /// The start frame is sent for image- and frame-conditioned jobs; the
    /// end frame only for frame-conditioned jobs that carry both frames.
    pub fn from_job(job: &VideoJob) -> Self {
        let image = match job.input_mode {
            InputMode::TextOnly => None,
            InputMode::ImageToVideo | InputMode::FramesToVideo => {
                job.start_frame.as_ref().map(InlineImage::from)
            }
        };

        let last_frame = match (job.input_mode, &job.start_frame, &job.end_frame) {
            (InputMode::FramesToVideo, Some(_), Some(end)) => Some(InlineImage::from(end)),
            _ => None,
        };

        Self {
            instances: vec![GenerateInstance {
                prompt: job.prompt.clone(),
                image,
                last_frame,
            }],
            parameters: GenerateParameters {
                aspect_ratio: job.aspect_ratio.as_str(),
                resolution: job.resolution.as_str(),
                sample_count: 1,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Long-running operation
// ---------------------------------------------------------------------------

/// A long-running operation as returned by submit and poll calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Server-assigned handle, e.g. `models/veo/operations/abc123`.
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub response: Option<OperationResponse>,
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedSample {
    pub video: Option<VideoReference>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoReference {
    pub uri: Option<String>,
}

/// Error reported by the service for a finished operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Operation {
    /// Download locator of the first generated video, if any.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
    }
}
