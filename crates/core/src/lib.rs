//! Domain types for the Veo batch queue.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! remote client, the scheduler and the worker binary alike.

pub mod batch;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod options;
pub mod scheduling;
pub mod types;
