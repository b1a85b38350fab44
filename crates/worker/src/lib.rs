//! Batch worker: reads prompts from disk, queues one Veo job per prompt,
//! drives the scheduler until the queue drains and writes each finished
//! video to the output directory.

pub mod config;
pub mod jobs;
pub mod run;

pub use config::WorkerConfig;
pub use run::{run, run_with, RunSummary};
