//! Queue configuration loaded from environment variables.
//!
//! | Env Var                  | Default |
//! |--------------------------|---------|
//! | `QUEUE_MAX_CONCURRENT`   | `4`     |
//! | `QUEUE_MAX_PER_MINUTE`   | `4`     |
//! | `QUEUE_TICK_INTERVAL_MS` | `2000`  |
//!
//! Both structs are immutable once the scheduler starts.

use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;
use crate::scheduling::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_PER_MINUTE, DEFAULT_TICK_INTERVAL, RATE_WINDOW,
};

/// Admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of RUNNING jobs.
    pub max_concurrent: usize,
    /// Maximum job starts within any sliding rate window.
    pub max_per_minute: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_per_minute: DEFAULT_MAX_PER_MINUTE,
        }
    }
}

impl QueueConfig {
    pub fn new(max_concurrent: usize, max_per_minute: usize) -> Result<Self, CoreError> {
        let config = Self {
            max_concurrent,
            max_per_minute,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let max_concurrent =
            parse_or(&lookup, "QUEUE_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT)?;
        let max_per_minute =
            parse_or(&lookup, "QUEUE_MAX_PER_MINUTE", DEFAULT_MAX_PER_MINUTE)?;
        Self::new(max_concurrent, max_per_minute)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.max_concurrent == 0 {
            return Err(CoreError::Config(
                "QUEUE_MAX_CONCURRENT must be at least 1".to_string(),
            ));
        }
        if self.max_per_minute == 0 {
            return Err(CoreError::Config(
                "QUEUE_MAX_PER_MINUTE must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scheduler loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub rate_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            rate_window: RATE_WINDOW,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let tick_ms: u64 = parse_or(
            &lookup,
            "QUEUE_TICK_INTERVAL_MS",
            DEFAULT_TICK_INTERVAL.as_millis() as u64,
        )?;
        if tick_ms == 0 {
            return Err(CoreError::Config(
                "QUEUE_TICK_INTERVAL_MS must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            tick_interval: Duration::from_millis(tick_ms),
            rate_window: RATE_WINDOW,
        })
    }
}

/// Parse `key` with `lookup`, falling back to `default` when unset or blank.
pub fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
        _ => Ok(default),
    }
}
