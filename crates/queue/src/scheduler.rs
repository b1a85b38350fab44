//! The scheduler loop and its handle.
//!
//! A single long-lived Tokio task owns the job store, the admission
//! controller and the enabled flag. It reacts to three inputs via
//! `tokio::select!`:
//!
//! - the tick interval (only while enabled),
//! - [`SchedulerCommand`]s sent by [`SchedulerHandle`]s,
//! - [`JobOutcome`]s reported by spawned generation tasks.
//!
//! Each tick admits at most one job. Generation never blocks the loop,
//! and every failure is recorded on the job rather than propagated.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use veoq_core::config::{QueueConfig, SchedulerConfig};
use veoq_core::error::CoreError;
use veoq_core::job::{JobSpec, JobStatus, VideoJob};
use veoq_core::media::MediaBlob;
use veoq_core::types::JobId;
use veoq_veo::credentials::Credentials;
use veoq_veo::error::GenerationError;
use veoq_veo::generator::VideoGenerator;

use crate::admission::{Admission, AdmissionController};
use crate::error::SchedulerError;
use crate::events::{QueueEvent, EVENT_CHANNEL_CAPACITY};
use crate::store::{JobStore, QueueStats};

/// Capacity of the command channel between handles and the loop.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests sent from a [`SchedulerHandle`] to the loop.
#[derive(Debug)]
pub enum SchedulerCommand {
    Enqueue {
        specs: Vec<JobSpec>,
        reply: oneshot::Sender<Result<Vec<JobId>, CoreError>>,
    },
    Start {
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    Tick {
        reply: oneshot::Sender<TickOutcome>,
    },
    Retry {
        id: JobId,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    ClearFinished {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<VideoJob>>,
    },
    Job {
        id: JobId,
        reply: oneshot::Sender<Option<VideoJob>>,
    },
    Stats {
        reply: oneshot::Sender<QueueStats>,
    },
    IsEnabled {
        reply: oneshot::Sender<bool>,
    },
}

/// Result of one generation task, sent back to the loop.
#[derive(Debug)]
pub struct JobOutcome {
    pub id: JobId,
    pub result: Result<MediaBlob, GenerationError>,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The scheduler is paused.
    Disabled,
    /// No API key is selected; nothing may be submitted.
    NoCredential,
    /// Admission was refused.
    Denied(Admission),
    /// A job was moved to RUNNING.
    Started(JobId),
    /// No PENDING jobs, but some are still running.
    Waiting,
    /// No PENDING or RUNNING jobs; the scheduler paused itself.
    Drained,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    store: JobStore,
    admission: AdmissionController,
    enabled: bool,
    config: SchedulerConfig,
    generator: Arc<dyn VideoGenerator>,
    credentials: Credentials,
    event_tx: broadcast::Sender<QueueEvent>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    outcome_tx: mpsc::UnboundedSender<JobOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<JobOutcome>,
}

impl Scheduler {
    /// Build a paused scheduler and a handle to it.
    ///
    /// Nothing runs until [`run`](Self::run) is driven; most callers want
    /// [`Scheduler::spawn`] instead.
    pub fn new(
        queue_config: QueueConfig,
        config: SchedulerConfig,
        generator: Arc<dyn VideoGenerator>,
        credentials: Credentials,
    ) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let scheduler = Self {
            store: JobStore::new(),
            admission: AdmissionController::new(queue_config, config.rate_window),
            enabled: false,
            config,
            generator,
            credentials,
            event_tx: event_tx.clone(),
            command_rx,
            outcome_tx,
            outcome_rx,
        };

        let handle = SchedulerHandle {
            command_tx,
            event_tx,
            cancel: CancellationToken::new(),
        };

        (scheduler, handle)
    }

    /// Build a scheduler and run it on a new Tokio task.
    pub fn spawn(
        queue_config: QueueConfig,
        config: SchedulerConfig,
        generator: Arc<dyn VideoGenerator>,
        credentials: Credentials,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (scheduler, handle) = Self::new(queue_config, config, generator, credentials);
        let cancel = handle.cancel.clone();
        let task = tokio::spawn(scheduler.run(cancel));
        (handle, task)
    }

    /// Run the loop until the token is cancelled or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            max_concurrent = self.admission.config().max_concurrent,
            max_per_minute = self.admission.config().max_per_minute,
            "Scheduler loop started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                Some(outcome) = self.outcome_rx.recv() => {
                    self.apply_outcome(outcome);
                }
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        tracing::info!("All scheduler handles dropped");
                        break;
                    };
                    if self.handle_command(command) {
                        // Behave like a freshly armed timer: first tick one
                        // interval after enabling.
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if self.enabled => {
                    self.tick(Instant::now());
                }
            }
        }
    }

    /// Apply a command. Returns `true` if it switched the scheduler on.
    fn handle_command(&mut self, command: SchedulerCommand) -> bool {
        let was_enabled = self.enabled;

        match command {
            SchedulerCommand::Enqueue { specs, reply } => {
                let _ = reply.send(self.enqueue(specs));
            }
            SchedulerCommand::Start { reply } => {
                self.set_enabled(true, false);
                let _ = reply.send(());
            }
            SchedulerCommand::Pause { reply } => {
                self.set_enabled(false, false);
                let _ = reply.send(());
            }
            SchedulerCommand::Tick { reply } => {
                let _ = reply.send(self.tick(Instant::now()));
            }
            SchedulerCommand::Retry { id, reply } => {
                let _ = reply.send(self.retry(id));
            }
            SchedulerCommand::ClearFinished { reply } => {
                let removed = self.store.clear_finished();
                if removed > 0 {
                    tracing::info!(removed, "Cleared finished jobs");
                    self.emit(QueueEvent::JobsCleared { removed });
                }
                let _ = reply.send(removed);
            }
            SchedulerCommand::Snapshot { reply } => {
                let _ = reply.send(self.store.list().to_vec());
            }
            SchedulerCommand::Job { id, reply } => {
                let _ = reply.send(self.store.get(id).cloned());
            }
            SchedulerCommand::Stats { reply } => {
                let _ = reply.send(self.store.stats());
            }
            SchedulerCommand::IsEnabled { reply } => {
                let _ = reply.send(self.enabled);
            }
        }

        !was_enabled && self.enabled
    }

    /// One scheduling round.
    fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.enabled {
            return TickOutcome::Disabled;
        }

        let running = self.store.count(JobStatus::Running);

        // Drain even without a key: pausing starts nothing.
        let Some(id) = self.store.next_pending() else {
            if running == 0 {
                tracing::info!("Queue drained, pausing scheduler");
                self.set_enabled(false, true);
                return TickOutcome::Drained;
            }
            return TickOutcome::Waiting;
        };

        if !self.credentials.is_selected() {
            tracing::debug!("No API key selected, skipping tick");
            return TickOutcome::NoCredential;
        }

        let admission = self.admission.check(running, now);
        if !admission.is_allowed() {
            tracing::debug!(?admission, running, "Admission denied");
            return TickOutcome::Denied(admission);
        }

        // Record the start before anything else so a burst of ticks can
        // never over-admit.
        self.admission.record_start(now);

        let started_at = Utc::now();
        let job = match self.store.update(id, |job| {
            job.start(started_at)?;
            Ok::<_, CoreError>(job.clone())
        }) {
            Some(Ok(job)) => job,
            Some(Err(e)) => {
                tracing::error!(job_id = %id, error = %e, "Failed to start job");
                return TickOutcome::Waiting;
            }
            None => return TickOutcome::Waiting,
        };

        tracing::info!(
            job_id = %job.id,
            attempt = job.attempt(),
            running = running + 1,
            recent_starts = self.admission.recent_starts(),
            "Job started",
        );
        self.emit(QueueEvent::JobStarted {
            job_id: job.id,
            attempt: job.attempt(),
        });

        self.spawn_generation(job);
        TickOutcome::Started(id)
    }

    /// Run the generator for `job` on its own task and report the outcome.
    ///
    /// A panic inside the generator is reported as a failed outcome so
    /// the job does not stay RUNNING forever.
    fn spawn_generation(&self, job: VideoJob) {
        let generator = Arc::clone(&self.generator);
        let outcome_tx = self.outcome_tx.clone();
        let id = job.id;

        tokio::spawn(async move {
            let task = tokio::spawn(async move { generator.generate(&job).await });
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(GenerationError::Transient(format!(
                    "Generation task aborted: {e}"
                ))),
            };
            // The loop only drops the receiver on shutdown.
            let _ = outcome_tx.send(JobOutcome { id, result });
        });
    }

    /// Write a finished generation back into the store.
    fn apply_outcome(&mut self, outcome: JobOutcome) {
        let JobOutcome { id, result } = outcome;
        let now = Utc::now();

        match result {
            Ok(blob) => {
                let result_uri = blob.uri();
                match self.store.update(id, |job| job.succeed(blob, now)) {
                    Some(Ok(())) => {
                        tracing::info!(job_id = %id, result = %result_uri, "Job succeeded");
                        self.emit(QueueEvent::JobSucceeded {
                            job_id: id,
                            result_uri,
                        });
                    }
                    Some(Err(e)) => {
                        tracing::error!(job_id = %id, error = %e, "Failed to record job success");
                    }
                    None => tracing::warn!(job_id = %id, "Outcome for unknown job"),
                }
            }
            Err(error) => {
                let message = error.to_string();
                let credential = error.is_credential();
                match self.store.update(id, |job| job.fail(message.clone(), now)) {
                    Some(Ok(())) => {
                        tracing::warn!(job_id = %id, error = %message, "Job failed");
                        self.emit(QueueEvent::JobFailed {
                            job_id: id,
                            error: message,
                            credential,
                        });
                    }
                    Some(Err(e)) => {
                        tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
                    }
                    None => tracing::warn!(job_id = %id, "Outcome for unknown job"),
                }

                if credential {
                    tracing::warn!(job_id = %id, "API key rejected, invalidating credentials");
                    self.credentials.invalidate();
                    self.emit(QueueEvent::CredentialInvalidated);
                }
            }
        }
    }

    fn enqueue(&mut self, specs: Vec<JobSpec>) -> Result<Vec<JobId>, CoreError> {
        let jobs = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                spec.validate()
                    .map(VideoJob::new)
                    .map_err(|e| CoreError::Validation(format!("Job {}: {e}", i + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self.store.append(jobs)?;
        tracing::info!(count = ids.len(), "Jobs queued");
        self.emit(QueueEvent::JobsQueued {
            job_ids: ids.clone(),
        });
        Ok(ids)
    }

    /// FAILED -> PENDING, re-enabling the scheduler if it was paused.
    fn retry(&mut self, id: JobId) -> Result<(), CoreError> {
        self.store
            .update(id, |job| job.retry())
            .ok_or(CoreError::NotFound { entity: "job", id })??;

        tracing::info!(job_id = %id, "Job queued for retry");
        self.emit(QueueEvent::JobRetried { job_id: id });
        self.set_enabled(true, false);
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool, drained: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            tracing::info!("Scheduler started");
            self.emit(QueueEvent::SchedulerStarted);
        } else {
            tracing::info!(drained, "Scheduler paused");
            self.emit(QueueEvent::SchedulerPaused { drained });
        }
    }

    fn emit(&self, event: QueueEvent) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.event_tx.send(event);
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front door to a running [`Scheduler`].
///
/// Every method is a round trip through the scheduler task, so the job
/// store is never touched from outside it.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    event_tx: broadcast::Sender<QueueEvent>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Validate and append jobs built from `specs`. All or nothing.
    pub async fn enqueue(&self, specs: Vec<JobSpec>) -> Result<Vec<JobId>, SchedulerError> {
        Ok(self
            .request(|reply| SchedulerCommand::Enqueue { specs, reply })
            .await??)
    }

    /// Begin admitting jobs on each tick.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.request(|reply| SchedulerCommand::Start { reply }).await
    }

    /// Stop admitting jobs. Running jobs continue to completion.
    pub async fn pause(&self) -> Result<(), SchedulerError> {
        self.request(|reply| SchedulerCommand::Pause { reply }).await
    }

    /// Run one tick immediately.
    pub async fn tick(&self) -> Result<TickOutcome, SchedulerError> {
        self.request(|reply| SchedulerCommand::Tick { reply }).await
    }

    /// Send a FAILED job back to PENDING and make sure the scheduler runs.
    pub async fn retry(&self, id: JobId) -> Result<(), SchedulerError> {
        Ok(self
            .request(|reply| SchedulerCommand::Retry { id, reply })
            .await??)
    }

    /// Remove SUCCESS and FAILED jobs; returns how many were removed.
    pub async fn clear_finished(&self) -> Result<usize, SchedulerError> {
        self.request(|reply| SchedulerCommand::ClearFinished { reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<Vec<VideoJob>, SchedulerError> {
        self.request(|reply| SchedulerCommand::Snapshot { reply })
            .await
    }

    pub async fn job(&self, id: JobId) -> Result<Option<VideoJob>, SchedulerError> {
        self.request(|reply| SchedulerCommand::Job { id, reply })
            .await
    }

    pub async fn stats(&self) -> Result<QueueStats, SchedulerError> {
        self.request(|reply| SchedulerCommand::Stats { reply }).await
    }

    pub async fn is_enabled(&self) -> Result<bool, SchedulerError> {
        self.request(|reply| SchedulerCommand::IsEnabled { reply })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the loop. In-flight generation tasks are detached.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
    ) -> Result<T, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| SchedulerError::Stopped)?;
        rx.await.map_err(|_| SchedulerError::Stopped)
    }
}
