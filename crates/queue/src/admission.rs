//! Admission control: a concurrency cap plus a sliding-window rate limit.
//!
//! [`RateWindow`] remembers the instant of every recent job start and
//! counts those within the trailing window. This caps starts in *any*
//! window-length span, unlike a per-calendar-minute counter or a token
//! bucket.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use veoq_core::config::QueueConfig;

// ---------------------------------------------------------------------------
// Sliding window
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RateWindow {
    width: Duration,
    starts: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(width: Duration) -> Self {
        Self {
            width,
            starts: VecDeque::new(),
        }
    }

    /// Drop starts that are at least `width` old relative to `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.starts.front() {
            if now.saturating_duration_since(oldest) >= self.width {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.starts.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// When the oldest recorded start leaves the window.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.starts.front().map(|oldest| *oldest + self.width)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// `running` jobs already occupy every slot.
    DeniedConcurrency { running: usize },
    /// The window is full until `retry_at`.
    DeniedRateLimit { retry_at: Instant },
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug)]
pub struct AdmissionController {
    config: QueueConfig,
    window: RateWindow,
}

impl AdmissionController {
    pub fn new(config: QueueConfig, window: Duration) -> Self {
        Self {
            config,
            window: RateWindow::new(window),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Decide whether a job may start now, given how many are running.
    ///
    /// Prunes the rate window as a side effect. Does not record a start;
    /// call [`record_start`](Self::record_start) when a job is admitted.
    pub fn check(&mut self, running: usize, now: Instant) -> Admission {
        if running >= self.config.max_concurrent {
            return Admission::DeniedConcurrency { running };
        }

        self.window.prune(now);
        if self.window.len() >= self.config.max_per_minute {
            let retry_at = self.window.next_expiry().unwrap_or(now);
            return Admission::DeniedRateLimit { retry_at };
        }

        Admission::Allowed
    }

    pub fn record_start(&mut self, now: Instant) {
        self.window.record(now);
    }

    /// Starts currently counted against the rate limit.
    pub fn recent_starts(&self) -> usize {
        self.window.len()
    }
}
