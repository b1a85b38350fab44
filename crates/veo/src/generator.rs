//! The generation seam driven by the scheduler.
//!
//! [`VideoGenerator`] turns one job into one video. [`VeoGenerator`] is
//! the production implementation: submit, poll, locate, download.

use async_trait::async_trait;
use veoq_core::job::VideoJob;
use veoq_core::media::MediaBlob;

use crate::api::VeoApi;
use crate::config::VeoConfig;
use crate::credentials::Credentials;
use crate::error::GenerationError;
use crate::messages::GenerateVideosRequest;
use crate::poll::{poll_until_done, PollConfig};

/// Produces a video for a job.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, job: &VideoJob) -> Result<MediaBlob, GenerationError>;
}

/// [`VideoGenerator`] backed by the Veo REST API.
pub struct VeoGenerator {
    api: VeoApi,
    credentials: Credentials,
    poll: PollConfig,
}

impl VeoGenerator {
    pub fn new(api: VeoApi, credentials: Credentials, poll: PollConfig) -> Self {
        Self {
            api,
            credentials,
            poll,
        }
    }

    pub fn from_config(config: &VeoConfig, credentials: Credentials) -> Self {
        Self::new(VeoApi::new(config.api_url.clone()), credentials, config.poll)
    }
}

#[async_trait]
impl VideoGenerator for VeoGenerator {
    async fn generate(&self, job: &VideoJob) -> Result<MediaBlob, GenerationError> {
        // Read the key per job so a freshly selected key is picked up.
        let key = self
            .credentials
            .current()
            .ok_or_else(|| GenerationError::Credential("No API key selected".to_string()))?;

        let request = GenerateVideosRequest::from_job(job);
        let operation = self
            .api
            .submit_generation(key.expose(), job.model, &request)
            .await?;

        tracing::info!(
            job_id = %job.id,
            operation = %operation.name,
            model = %job.model,
            "Generation submitted",
        );

        let operation = poll_until_done(&self.api, key.expose(), operation, &self.poll).await?;

        let uri = match operation.video_uri() {
            Some(uri) => uri.to_string(),
            None => {
                return Err(match &operation.error {
                    Some(error) => GenerationError::from_operation_error(error),
                    None => GenerationError::NoResult,
                });
            }
        };

        let media = self
            .api
            .download(key.expose(), &uri)
            .await
            .map_err(GenerationError::download)?;

        tracing::info!(
            job_id = %job.id,
            bytes = media.data.len(),
            "Video downloaded",
        );

        Ok(MediaBlob::new(media.content_type, media.data))
    }
}
