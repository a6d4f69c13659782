//! Retry - Bounded retries for transient provider errors
//!
//! Cloud APIs are eventually consistent: a certificate that was just issued
//! may not be visible yet, a rule priority may be taken concurrently, a
//! resource that was just created may not show up in describe calls. These
//! helpers retry an operation until it succeeds, fails permanently, or the
//! timeout elapses.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Outcome of one attempt
#[derive(Debug)]
pub enum RetryError<E> {
    /// Try again after the next interval
    Retryable(E),
    /// Stop immediately
    NonRetryable(E),
}

/// Why a retry loop gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryFailure<E: std::fmt::Display> {
    #[error("timeout after {elapsed:?}: {}", last.as_ref().map(|e| e.to_string()).unwrap_or_default())]
    Timeout { last: Option<E>, elapsed: Duration },

    #[error("{0}")]
    Permanent(E),
}

impl<E: std::fmt::Display> RetryFailure<E> {
    /// The underlying error, if any
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryFailure::Timeout { last, .. } => last,
            RetryFailure::Permanent(e) => Some(e),
        }
    }
}

/// Timing of a retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Give up once this much time has passed
    pub timeout: Duration,
    /// Wait before the second attempt; doubled after each attempt
    pub interval: Duration,
    /// Upper bound for the interval
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        if self.max_interval < interval {
            self.max_interval = interval;
        }
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_interval)
    }
}

/// Time left before `deadline`, or `None` once it has passed
fn remaining(deadline: Instant) -> Option<Duration> {
    deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
}

/// Retry `op` until it returns Ok, a non-retryable error, or the timeout elapses.
///
/// The last sleep is cut short at the deadline, so one final attempt is made
/// when the timeout is reached.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryFailure<E>>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut interval = policy.interval;
    let mut attempt = 1u32;

    loop {
        let wait = match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(RetryFailure::Permanent(e)),
            Err(RetryError::Retryable(e)) => match remaining(deadline) {
                Some(left) => {
                    let wait = interval.min(left);
                    log::debug!("attempt {} failed, retrying in {:?}: {}", attempt, wait, e);
                    wait
                }
                None => {
                    return Err(RetryFailure::Timeout {
                        last: Some(e),
                        elapsed: start.elapsed(),
                    });
                }
            },
        };

        sleep(wait).await;
        interval = policy.next_interval(interval);
        attempt += 1;
    }
}

/// Retry `op` while its error matches `should_retry`.
///
/// Once the timeout is reached one last attempt is made and its error is
/// returned as-is, so callers see the provider error rather than a timeout
/// wrapper.
pub async fn retry_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: P,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let deadline = Instant::now() + policy.timeout;
    let mut interval = policy.interval;
    let mut attempt = 1u32;

    loop {
        let wait = match op().await {
            Ok(value) => return Ok(value),
            Err(e) if should_retry(&e) => match remaining(deadline) {
                Some(left) => {
                    let wait = interval.min(left);
                    log::debug!("attempt {} failed, retrying in {:?}: {}", attempt, wait, e);
                    wait
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };

        sleep(wait).await;
        interval = policy.next_interval(interval);
        attempt += 1;
    }
}

/// Poll `op` while it reports "not found" (`Ok(None)`).
///
/// Used right after a create, while describe calls may not see the new
/// resource yet. Returns `Ok(None)` if it still does not show up on the
/// attempt made at the deadline.
pub async fn retry_when_not_found<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut interval = policy.interval;
    let mut attempt = 1u32;

    loop {
        let wait = match op().await? {
            Some(value) => return Ok(Some(value)),
            None => match remaining(deadline) {
                Some(left) => {
                    let wait = interval.min(left);
                    log::debug!("attempt {} found nothing yet, polling again in {:?}", attempt, wait);
                    wait
                }
                None => return Ok(None),
            },
        };

        sleep(wait).await;
        interval = policy.next_interval(interval);
        attempt += 1;
    }
}
