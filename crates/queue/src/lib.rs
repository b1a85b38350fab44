//! Job queue scheduler for Veo video generation.
//!
//! The [`scheduler::Scheduler`] owns the [`store::JobStore`] and the
//! [`admission::AdmissionController`] and is driven by a single Tokio
//! task. Callers talk to it through a cloneable
//! [`scheduler::SchedulerHandle`]; generation runs in spawned tasks that
//! report back over a channel, so the store has exactly one writer.

pub mod admission;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod store;
