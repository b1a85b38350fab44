//! Whole-batch runs against a scripted generator on virtual time.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use veoq_core::job::VideoJob;
use veoq_core::media::MediaBlob;
use veoq_veo::credentials::{ApiKey, Credentials};
use veoq_veo::error::GenerationError;
use veoq_veo::generator::VideoGenerator;
use veoq_worker::{run_with, WorkerConfig};

/// Prompts starting with `reject` fail with a credential error after one
/// second. Everything else takes ten seconds, and `fail` prompts then come
/// back without a video.
struct ScriptedGenerator;

#[async_trait]
impl VideoGenerator for ScriptedGenerator {
    async fn generate(&self, job: &VideoJob) -> Result<MediaBlob, GenerationError> {
        if job.prompt.starts_with("reject") {
            tokio::time::sleep(Duration::from_secs(1)).await;
            return Err(GenerationError::Credential(
                "API_KEY_INVALID".to_string(),
            ));
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        if job.prompt.starts_with("fail") {
            return Err(GenerationError::NoResult);
        }
        Ok(MediaBlob::new("video/mp4", job.prompt.clone().into_bytes()))
    }
}

fn config(dir: &Path, prompts: &str, max_concurrent: &str) -> WorkerConfig {
    let prompts_file = dir.join("prompts.txt");
    std::fs::write(&prompts_file, prompts).unwrap();

    let max_concurrent = max_concurrent.to_string();
    let mut config = WorkerConfig::from_lookup(move |key: &str| {
        (key == "QUEUE_MAX_CONCURRENT").then(|| max_concurrent.clone())
    })
    .unwrap();
    config.prompts_file = prompts_file;
    config.output_dir = dir.join("videos");
    config
}

fn keyed() -> Credentials {
    Credentials::new(Some(ApiKey::new("test-key")))
}

#[tokio::test(start_paused = true)]
async fn every_prompt_becomes_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "a harbour at dawn\na kite\n\na comet\n", "4");

    let summary = run_with(&config, Arc::new(ScriptedGenerator), keyed())
        .await
        .unwrap();

    assert!(summary.all_succeeded());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.saved.len(), 3);

    let mut contents: Vec<String> = summary
        .saved
        .iter()
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect();
    contents.sort();
    assert_eq!(contents, vec!["a comet", "a harbour at dawn", "a kite"]);
}

#[tokio::test(start_paused = true)]
async fn failures_are_counted_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "ok one\nfail two\nok three\n", "4");

    let summary = run_with(&config, Arc::new(ScriptedGenerator), keyed())
        .await
        .unwrap();

    assert!(!summary.all_succeeded());
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.unfinished, 0);
    assert_eq!(summary.saved.len(), 2);
    assert!(!summary.credential_rejected);
}

#[tokio::test(start_paused = true)]
async fn rejected_key_stops_after_running_jobs_finish() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "slow but fine\nreject me\nnever started\n", "2");
    let credentials = keyed();

    let summary = run_with(&config, Arc::new(ScriptedGenerator), credentials.clone())
        .await
        .unwrap();

    assert!(summary.credential_rejected);
    assert!(!credentials.is_selected());
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.unfinished, 1);

    // The job already in flight was still written out.
    assert_eq!(summary.saved.len(), 1);
    let name = summary.saved[0].file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("veo-batch-"));
    assert!(name.ends_with(".mp4"));
}

#[tokio::test]
async fn missing_prompts_file_fails_before_scheduling() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "x", "1");
    config.prompts_file = dir.path().join("missing.txt");

    let err = run_with(&config, Arc::new(ScriptedGenerator), keyed())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read prompts file"));
}
