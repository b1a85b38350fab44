//! REST API client for the Veo HTTP endpoints.
//!
//! Wraps generation submission, operation polling and video download
//! using [`reqwest`]. The API key travels in the `x-goog-api-key` header
//! on every call.

use async_trait::async_trait;
use serde::Deserialize;
use veoq_core::media::DEFAULT_VIDEO_MIME;
use veoq_core::options::VeoModel;

use crate::messages::{GenerateVideosRequest, Operation};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Public Gemini API endpoint.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";

/// HTTP client for the generation service.
#[derive(Clone)]
pub struct VeoApi {
    client: reqwest::Client,
    api_url: String,
}

/// A downloaded video body.
#[derive(Debug)]
pub struct DownloadedMedia {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Errors from the Veo REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum VeoApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Veo API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A submit response did not carry an operation name.
    #[error("Submit response did not include an operation name")]
    MissingOperationName,
}

/// Source of operation status, implemented by [`VeoApi`] and by test
/// doubles of the polling loop.
#[async_trait]
pub trait OperationPoller: Send + Sync {
    async fn get_operation(&self, api_key: &str, name: &str) -> Result<Operation, VeoApiError>;
}

#[derive(Debug, Deserialize)]
struct RawSubmitResponse {
    name: Option<String>,
    #[serde(default)]
    done: bool,
}

impl VeoApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://generativelanguage.googleapis.com`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a generation request.
    ///
    /// Sends `POST /v1beta/models/{model}:predictLongRunning` and returns
    /// the long-running operation handle.
    pub async fn submit_generation(
        &self,
        api_key: &str,
        model: VeoModel,
        request: &GenerateVideosRequest,
    ) -> Result<Operation, VeoApiError> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:predictLongRunning",
                self.api_url,
                model.as_str()
            ))
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await?;

        let raw: RawSubmitResponse = Self::parse_response(response).await?;
        let name = raw
            .name
            .filter(|n| !n.is_empty())
            .ok_or(VeoApiError::MissingOperationName)?;

        Ok(Operation {
            name,
            done: raw.done,
            response: None,
            error: None,
        })
    }

    /// Download the generated media at `uri`.
    pub async fn download(&self, api_key: &str, uri: &str) -> Result<DownloadedMedia, VeoApiError> {
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or(DEFAULT_VIDEO_MIME)
            .to_string();
        let data = response.bytes().await?.to_vec();

        Ok(DownloadedMedia { content_type, data })
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`VeoApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, VeoApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VeoApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VeoApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl OperationPoller for VeoApi {
    /// Fetch the current state of an operation via `GET /v1beta/{name}`.
    async fn get_operation(&self, api_key: &str, name: &str) -> Result<Operation, VeoApiError> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.api_url, name))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
