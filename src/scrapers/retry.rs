//! Bounded retry with exponential, jittered backoff.
//!
//! Every network-facing path goes through [`run`]. An attempt reports failure
//! as either [`Failure::Transient`] (back off and try again) or
//! [`Failure::Permanent`] (give up immediately). Both the attempts and the
//! sleeps between them stop as soon as the cancellation token fires.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Returned when the caller's token is cancelled mid-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Tagged failure of a single attempt.
#[derive(Debug)]
pub enum Failure<E> {
    Transient(E),
    Permanent(E),
}

impl<E> Failure<E> {
    pub fn into_inner(self) -> E {
        match self {
            Failure::Transient(e) | Failure::Permanent(e) => e,
        }
    }
}

/// How many times to retry and how long to wait before the first retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Un-jittered delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_delay.saturating_mul(1u32 << retry.min(16))
    }
}

/// Perturb a delay uniformly within [0.75, 1.25) of its value.
///
/// `rand::rng()` is a CSPRNG seeded per thread, so concurrent callers do not
/// fall into lockstep.
pub fn jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.75..1.25);
    delay.mul_f64(factor)
}

/// Sleep that wakes early with [`Cancelled`] when the token fires.
pub async fn sleep(cancel: &CancellationToken, duration: Duration) -> Result<(), Cancelled> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Run `attempt` up to `policy.max_retries + 1` times.
///
/// Returns the first success, the first permanent failure, or the last
/// transient failure once attempts are exhausted.
pub async fn run<T, E, F, Fut>(
    cancel: &CancellationToken,
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure<E>>>,
    E: From<Cancelled> + std::fmt::Display,
{
    let mut retry = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            outcome = attempt() => outcome,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(Failure::Permanent(e)) => return Err(e),
            Err(Failure::Transient(e)) => {
                if retry >= policy.max_retries {
                    return Err(e);
                }
                let delay = jitter(policy.backoff(retry));
                debug!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    retry + 1,
                    e,
                    delay
                );
                sleep(cancel, delay).await?;
                retry += 1;
            }
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds, capped at 60s.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    header_value?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(60)))
}
