//! Polling loop for long-running generation operations.
//!
//! [`poll_until_done`] sleeps a fixed interval between status checks and
//! stops once the operation reports `done`. Both budgets are opt-in: with
//! `max_attempts` or `max_elapsed` set, it gives up with
//! [`GenerationError::Timeout`] at whichever limit comes first. With
//! neither set it polls until the service answers.

use std::time::Duration;

use tokio::time::Instant;
use veoq_core::config::parse_or;
use veoq_core::error::CoreError;

use crate::api::OperationPoller;
use crate::error::GenerationError;
use crate::messages::Operation;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Tunable parameters for the poll loop.
///
/// No timeout value has been agreed for generation yet, so the default
/// sets no cap on attempts or elapsed time. Operators opt in through
/// [`PollConfig::from_lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each status check.
    pub interval: Duration,
    /// Upper bound on status checks. `None` means no cap.
    pub max_attempts: Option<u32>,
    /// Upper bound on total time spent polling. `None` means no cap.
    pub max_elapsed: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            max_elapsed: None,
        }
    }
}

impl PollConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                  | Default          |
    /// |--------------------------|------------------|
    /// | `VEO_POLL_INTERVAL_SECS` | `10`             |
    /// | `VEO_POLL_MAX_ATTEMPTS`  | unset (no cap)   |
    /// | `VEO_POLL_TIMEOUT_SECS`  | unset (no cap)   |
    ///
    /// `0` also means no cap for both limits.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let interval_secs: u64 = parse_or(
            &lookup,
            "VEO_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?;
        if interval_secs == 0 {
            return Err(CoreError::Config(
                "VEO_POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        let max_attempts: u32 = parse_or(&lookup, "VEO_POLL_MAX_ATTEMPTS", 0)?;
        let timeout_secs: u64 = parse_or(&lookup, "VEO_POLL_TIMEOUT_SECS", 0)?;

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            max_elapsed: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_elapsed.is_some_and(|max| elapsed >= max)
    }
}

/// Where the poll loop stands.
#[derive(Debug)]
pub enum PollState {
    /// Still running; `attempts` status checks made so far.
    Waiting { attempts: u32 },
    /// The service reported completion.
    Done(Operation),
    /// The budget ran out before completion.
    Exhausted { attempts: u32, elapsed: Duration },
}

/// Poll `operation` until it is done or the budget in `config` runs out.
///
/// An operation that is already done is returned without sleeping.
pub async fn poll_until_done<P>(
    poller: &P,
    api_key: &str,
    operation: Operation,
    config: &PollConfig,
) -> Result<Operation, GenerationError>
where
    P: OperationPoller + ?Sized,
{
    let started = Instant::now();
    let name = operation.name.clone();
    let mut state = if operation.done {
        PollState::Done(operation)
    } else {
        PollState::Waiting { attempts: 0 }
    };

    loop {
        state = match state {
            PollState::Waiting { attempts } => {
                let elapsed = started.elapsed();
                if config.is_exhausted(attempts, elapsed) {
                    PollState::Exhausted { attempts, elapsed }
                } else {
                    tokio::time::sleep(config.interval).await;
                    let current = poller.get_operation(api_key, &name).await?;
                    let attempts = attempts + 1;
                    tracing::debug!(
                        operation = %name,
                        attempt = attempts,
                        done = current.done,
                        "Polled operation",
                    );
                    if current.done {
                        PollState::Done(current)
                    } else {
                        PollState::Waiting { attempts }
                    }
                }
            }
            PollState::Done(operation) => return Ok(operation),
            PollState::Exhausted { attempts, elapsed } => {
                tracing::warn!(
                    operation = %name,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "Gave up polling operation",
                );
                return Err(GenerationError::Timeout { attempts, elapsed });
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::api::VeoApiError;

    /// Replays scripted responses, then reports the operation as still running.
    struct ScriptedPoller {
        responses: Mutex<VecDeque<Result<Operation, VeoApiError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedPoller {
        fn new(responses: Vec<Result<Operation, VeoApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl OperationPoller for ScriptedPoller {
        async fn get_operation(&self, _key: &str, name: &str) -> Result<Operation, VeoApiError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            match responses.pop_front() {
                Some(next) => next,
                None => Ok(op(name, false)),
            }
        }
    }

    fn op(name: &str, done: bool) -> Operation {
        Operation {
            name: name.to_string(),
            done,
            response: None,
            error: None,
        }
    }

    fn unbounded() -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(10),
            max_attempts: None,
            max_elapsed: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn already_done_skips_polling() {
        let poller = ScriptedPoller::new(vec![]);
        let start = Instant::now();
        let result = poll_until_done(&poller, "k", op("ops/1", true), &unbounded()).await;
        assert!(result.unwrap().done);
        assert_eq!(poller.calls(), 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_every_interval_until_done() {
        let poller = ScriptedPoller::new(vec![
            Ok(op("ops/1", false)),
            Ok(op("ops/1", false)),
            Ok(op("ops/1", true)),
        ]);
        let start = Instant::now();
        let result = poll_until_done(&poller, "k", op("ops/1", false), &unbounded()).await;
        assert!(result.unwrap().done);
        assert_eq!(poller.calls(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_yields_timeout() {
        let poller = ScriptedPoller::new(vec![]);
        let config = PollConfig {
            max_attempts: Some(4),
            ..unbounded()
        };
        let result = poll_until_done(&poller, "k", op("ops/1", false), &config).await;
        assert_matches!(result, Err(GenerationError::Timeout { attempts: 4, .. }));
        assert_eq!(poller.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_cap_yields_timeout() {
        let poller = ScriptedPoller::new(vec![]);
        let config = PollConfig {
            max_elapsed: Some(Duration::from_secs(25)),
            ..unbounded()
        };
        let result = poll_until_done(&poller, "k", op("ops/1", false), &config).await;
        assert_matches!(
            result,
            Err(GenerationError::Timeout { attempts: 3, elapsed }) if elapsed >= Duration::from_secs(25)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_error_is_classified() {
        let poller = ScriptedPoller::new(vec![Err(VeoApiError::ApiError {
            status: 404,
            body: "Requested entity was not found.".to_string(),
        })]);
        let result = poll_until_done(&poller, "k", op("ops/1", false), &unbounded()).await;
        assert_matches!(result, Err(GenerationError::Credential(_)));
    }

    #[test]
    fn config_from_env() {
        let config = PollConfig::from_lookup(|key| match key {
            "VEO_POLL_INTERVAL_SECS" => Some("5".to_string()),
            "VEO_POLL_MAX_ATTEMPTS" => Some("12".to_string()),
            "VEO_POLL_TIMEOUT_SECS" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_attempts, Some(12));
        assert_eq!(config.max_elapsed, None);
    }

    #[test]
    fn config_defaults() {
        let config = PollConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PollConfig::default());
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.max_elapsed, None);
    }

    #[test]
    fn timeout_is_opt_in() {
        let config = PollConfig::from_lookup(|key| {
            (key == "VEO_POLL_TIMEOUT_SECS").then(|| "900".to_string())
        })
        .unwrap();
        assert_eq!(config.max_elapsed, Some(Duration::from_secs(900)));
        assert_eq!(config.max_attempts, None);
    }

    #[tokio::test(start_paused = true)]
    async fn default_config_waits_out_a_long_operation() {
        // Three hours of "still running" before the service finishes.
        let mut responses: Vec<_> = (0..1080).map(|_| Ok(op("ops/1", false))).collect();
        responses.push(Ok(op("ops/1", true)));
        let poller = ScriptedPoller::new(responses);

        let result =
            poll_until_done(&poller, "k", op("ops/1", false), &PollConfig::default()).await;
        assert!(result.unwrap().done);
        assert_eq!(poller.calls(), 1081);
    }

    #[test]
    fn zero_interval_rejected() {
        let result = PollConfig::from_lookup(|key| {
            (key == "VEO_POLL_INTERVAL_SECS").then(|| "0".to_string())
        });
        assert_matches!(result, Err(CoreError::Config(_)));
    }
}
