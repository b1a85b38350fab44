//! Reading batch input from disk and writing finished videos back.

use std::path::{Path, PathBuf};

use anyhow::Context;
use veoq_core::batch::parse_batch_prompts;
use veoq_core::job::{JobSpec, VideoJob};
use veoq_core::media::{download_file_name, ImagePayload};

use crate::config::WorkerConfig;

/// Build one validated spec per non-blank line of the prompts file.
pub fn load_jobs(config: &WorkerConfig) -> anyhow::Result<Vec<JobSpec>> {
    let text = std::fs::read_to_string(&config.prompts_file).with_context(|| {
        format!(
            "Failed to read prompts file {}",
            config.prompts_file.display()
        )
    })?;

    let prompts = parse_batch_prompts(&text);
    if prompts.is_empty() {
        anyhow::bail!(
            "Prompts file {} contains no prompts",
            config.prompts_file.display()
        );
    }

    let template = JobSpec {
        input_mode: config.input_mode(),
        model: config.model,
        aspect_ratio: config.aspect_ratio,
        resolution: config.resolution,
        start_frame: config.start_image.as_deref().map(load_image).transpose()?,
        end_frame: config.end_image.as_deref().map(load_image).transpose()?,
        ..JobSpec::text("")
    };

    JobSpec::batch(prompts, &template)
        .into_iter()
        .enumerate()
        .map(|(i, spec)| spec.validate().with_context(|| format!("Prompt {}", i + 1)))
        .collect()
}

/// Read a reference frame, guessing its MIME type from the extension.
pub fn load_image(path: &Path) -> anyhow::Result<ImagePayload> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    Ok(ImagePayload::new(ImagePayload::mime_for_extension(ext), data))
}

/// Write a successful job's video into `dir`. Returns the file path.
pub fn save_video(dir: &Path, job: &VideoJob) -> anyhow::Result<PathBuf> {
    let Some(blob) = job.result() else {
        anyhow::bail!("Job {} has no video to save", job.id);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(download_file_name(job.id));
    std::fs::write(&path, &blob.data)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(job_id = %job.id, path = %path.display(), bytes = blob.len(), "Saved video");
    Ok(path)
}
