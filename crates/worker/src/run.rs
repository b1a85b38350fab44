//! Drive one batch from the prompts file to videos on disk.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use veoq_core::job::{JobSpec, JobStatus};
use veoq_core::types::JobId;
use veoq_queue::events::QueueEvent;
use veoq_queue::scheduler::{Scheduler, SchedulerHandle};
use veoq_veo::credentials::Credentials;
use veoq_veo::generator::{VeoGenerator, VideoGenerator};

use crate::config::WorkerConfig;
use crate::jobs::{load_jobs, save_video};

/// Final tally of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs left PENDING or RUNNING when the run stopped.
    pub unfinished: usize,
    pub saved: Vec<PathBuf>,
    /// Set when the run stopped because the API key was rejected.
    pub credential_rejected: bool,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.succeeded == self.total
    }
}

/// Run the batch described by `config` against the live service.
pub async fn run(config: WorkerConfig) -> anyhow::Result<RunSummary> {
    let credentials = Credentials::from_env();
    if !credentials.is_selected() {
        anyhow::bail!("No API key selected; set GEMINI_API_KEY or API_KEY");
    }

    let generator = VeoGenerator::from_config(&config.veo, credentials.clone());
    tracing::info!(api_url = %config.veo.api_url, model = %config.model, "Veo client ready");

    run_with(&config, Arc::new(generator), credentials).await
}

/// Run the batch with an explicit generator and credential holder.
pub async fn run_with(
    config: &WorkerConfig,
    generator: Arc<dyn VideoGenerator>,
    credentials: Credentials,
) -> anyhow::Result<RunSummary> {
    let specs = load_jobs(config)?;
    tracing::info!(
        count = specs.len(),
        prompts_file = %config.prompts_file.display(),
        mode = %config.input_mode(),
        "Loaded prompts",
    );

    let (handle, task) = Scheduler::spawn(
        config.queue,
        config.scheduler,
        generator,
        credentials.clone(),
    );
    let result = drive(config, &handle, &credentials, specs).await;

    handle.shutdown();
    if let Err(e) = task.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }
    result
}

async fn drive(
    config: &WorkerConfig,
    handle: &SchedulerHandle,
    credentials: &Credentials,
    specs: Vec<JobSpec>,
) -> anyhow::Result<RunSummary> {
    // Subscribe before enqueueing so no event is missed.
    let mut events = handle.subscribe();
    handle.enqueue(specs).await?;
    handle.start().await?;

    let mut saved: HashSet<JobId> = HashSet::new();
    let mut summary = RunSummary::default();

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event stream lagged; checking queue state");
                if settled_after_lag(handle, credentials, &mut summary).await? {
                    break;
                }
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            QueueEvent::JobSucceeded { job_id, .. } => {
                save_once(config, handle, job_id, &mut saved, &mut summary).await?;
            }
            QueueEvent::JobFailed { job_id, error, .. } => {
                tracing::warn!(job_id = %job_id, error = %error, "Job failed");
            }
            QueueEvent::SchedulerPaused { drained: true } => break,
            QueueEvent::CredentialInvalidated => {
                tracing::error!("API key rejected; letting running jobs finish");
                summary.credential_rejected = true;
                handle.pause().await?;
            }
            _ => {}
        }

        if summary.credential_rejected && handle.stats().await?.running == 0 {
            break;
        }
    }

    // Catch anything a lagged receiver skipped.
    for job in handle.snapshot().await? {
        if job.status() == JobStatus::Success {
            save_once(config, handle, job.id, &mut saved, &mut summary).await?;
        }
    }

    let stats = handle.stats().await?;
    summary.total = stats.total;
    summary.succeeded = stats.success;
    summary.failed = stats.failed;
    summary.unfinished = stats.pending + stats.running;

    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        unfinished = summary.unfinished,
        output_dir = %config.output_dir.display(),
        "Batch finished",
    );
    Ok(summary)
}

/// Recover the stop conditions whose events a lagged receiver may have
/// skipped. Returns `true` when no further event will move the batch on.
async fn settled_after_lag(
    handle: &SchedulerHandle,
    credentials: &Credentials,
    summary: &mut RunSummary,
) -> anyhow::Result<bool> {
    if !credentials.is_selected() && !summary.credential_rejected {
        tracing::error!("API key rejected; letting running jobs finish");
        summary.credential_rejected = true;
        handle.pause().await?;
    }

    let stats = handle.stats().await?;
    if stats.running > 0 {
        return Ok(false);
    }
    Ok(stats.pending == 0 || !handle.is_enabled().await?)
}

async fn save_once(
    config: &WorkerConfig,
    handle: &SchedulerHandle,
    id: JobId,
    saved: &mut HashSet<JobId>,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    if saved.contains(&id) {
        return Ok(());
    }
    let Some(job) = handle.job(id).await? else {
        return Ok(());
    };
    summary.saved.push(save_video(&config.output_dir, &job)?);
    saved.insert(id);
    Ok(())
}
