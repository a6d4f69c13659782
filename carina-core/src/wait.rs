//! Wait - Poll a remote object until it reaches a target state
//!
//! The remote object follows a lifecycle owned by the cloud provider
//! (e.g. a load balancer goes `provisioning` -> `active`). The waiter polls a
//! refresh function and classifies each observed state as pending, target,
//! or unexpected.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E: std::fmt::Display> {
    #[error("timeout while waiting for state to become '{}' (last state: '{}', timeout: {timeout:?})", target.join(", "), last_state.as_deref().unwrap_or("none"))]
    Timeout {
        last_state: Option<String>,
        target: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("{0}")]
    Refresh(E),
}

/// State-change poller
#[derive(Debug, Clone)]
pub struct StateWaiter {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait this long before the first refresh
    pub delay: Duration,
    /// Wait between refreshes
    pub poll_interval: Duration,
    /// How many consecutive "not found" results to tolerate while a target is expected
    pub not_found_checks: u32,
    /// Consecutive target observations needed before returning
    pub continuous_target_occurrence: u32,
}

impl StateWaiter {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
            not_found_checks: 20,
            continuous_target_occurrence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences.max(1);
        self
    }

    /// Poll until a target state is seen.
    ///
    /// `refresh` returns the object and its state, or `None` when the object
    /// does not exist. With an empty target set, `None` means done (used for
    /// deletions) and the result is `Ok(None)`.
    pub async fn wait<T, E, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, E>>,
    {
        let start = Instant::now();
        let mut last_state: Option<String> = None;
        let mut not_found = 0u32;
        let mut occurrences = 0u32;

        if !self.delay.is_zero() {
            sleep(self.delay.min(self.timeout)).await;
        }

        loop {
            match refresh().await.map_err(WaitError::Refresh)? {
                None => {
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    occurrences = 0;
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(WaitError::NotFound { checks: not_found });
                    }
                    log::debug!("waiting: resource not found ({}/{})", not_found, self.not_found_checks);
                }
                Some((value, state)) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        occurrences += 1;
                        if occurrences >= self.continuous_target_occurrence {
                            return Ok(Some(value));
                        }
                    } else if self.pending.contains(&state) {
                        occurrences = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    log::debug!("waiting: current state '{}'", state);
                    last_state = Some(state);
                }
            }

            if start.elapsed() + self.poll_interval > self.timeout {
                return Err(WaitError::Timeout {
                    last_state,
                    target: self.target.clone(),
                    timeout: self.timeout,
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}
