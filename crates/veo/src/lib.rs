//! Client for the Veo long-running video generation API.
//!
//! Provides the REST wrapper ([`api`]), typed wire messages
//! ([`messages`]), API key state shared with the scheduler
//! ([`credentials`]), a bounded polling loop ([`poll`]) and the
//! [`generator::VideoGenerator`] seam the scheduler drives.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod generator;
pub mod messages;
pub mod poll;
