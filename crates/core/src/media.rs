//! Binary payloads: reference images going out, generated videos coming
//! back.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::types::JobId;

/// Default MIME type for reference frames.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Default MIME type for downloaded videos.
pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// A reference image (start or end frame) attached to a job.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Raw image bytes. Not serialized; the presentation layer only needs
    /// to know a frame is attached.
    #[serde(skip)]
    pub data: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Guess the MIME type from a file extension, falling back to PNG.
    pub fn mime_for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            _ => DEFAULT_IMAGE_MIME,
        }
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A generated video held in memory.
///
/// This is the locally-addressable result handle stored on a successful
/// job. Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct MediaBlob {
    pub id: uuid::Uuid,
    pub content_type: String,
    #[serde(skip)]
    pub data: Arc<[u8]>,
}

impl MediaBlob {
    pub fn new(content_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Local address of the blob, e.g. `blob:6f1c...`.
    pub fn uri(&self) -> String {
        format!("blob:{}", self.id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBlob")
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// File name used when a finished video is saved to disk.
pub fn download_file_name(job_id: JobId) -> String {
    let id = job_id.simple().to_string();
    format!("veo-batch-{}.mp4", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_uri_uses_blob_scheme() {
        let blob = MediaBlob::new(DEFAULT_VIDEO_MIME, vec![1u8, 2, 3]);
        assert!(blob.uri().starts_with("blob:"));
        assert_eq!(blob.len(), 3);
    }

    #[test]
    fn download_name_uses_id_prefix() {
        let id = uuid::Uuid::parse_str("6f1c2d3e-0000-4000-8000-000000000000").unwrap();
        assert_eq!(download_file_name(id), "veo-batch-6f1c2d3e.mp4");
    }

    #[test]
    fn mime_guess_covers_common_formats() {
        assert_eq!(ImagePayload::mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(ImagePayload::mime_for_extension("webp"), "image/webp");
        assert_eq!(ImagePayload::mime_for_extension("bmp"), DEFAULT_IMAGE_MIME);
    }

    #[test]
    fn debug_output_omits_bytes() {
        let image = ImagePayload::new("image/png", vec![0u8; 1024]);
        let debug = format!("{image:?}");
        assert!(debug.contains("len: 1024"));
    }
}
