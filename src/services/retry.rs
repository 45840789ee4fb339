// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded retry for storage operations.

use crate::db::StoreError;
use std::future::Future;
use std::time::Duration;

/// Retry budget for a storage step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between failed attempts
    pub delay: Duration,
    /// Pause before the first attempt, so freshly created auth records
    /// have propagated to the backend.
    pub settle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            settle: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// No waiting at all. Used by tests that don't exercise timing.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            settle: Duration::ZERO,
        }
    }
}

/// Outcome of a retried step.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error.
    Exhausted { attempts: u32, last: StoreError },
    /// The step reported a failure that retrying cannot fix.
    Terminal(E),
}

/// A failure of one attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Consumes an attempt.
    Store(StoreError),
    /// Stops immediately.
    Terminal(E),
}

impl<E> From<StoreError> for AttemptError<E> {
    fn from(err: StoreError) -> Self {
        AttemptError::Store(err)
    }
}

/// Run `op` up to `policy.max_attempts` times.
///
/// Storage errors of every kind consume an attempt and are logged; the
/// step itself decides whether `NotFound` is an error (usually it creates
/// the row instead). Terminal failures are returned without retrying.
pub async fn retry<T, E, F, Fut>(
    step: &'static str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    if !policy.settle.is_zero() {
        tokio::time::sleep(policy.settle).await;
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(step, attempt, "Step succeeded after retry");
                }
                return Ok(value);
            }
            Err(AttemptError::Terminal(e)) => return Err(RetryError::Terminal(e)),
            Err(AttemptError::Store(err)) => {
                tracing::warn!(
                    step,
                    attempt,
                    max_attempts,
                    kind = ?err.kind,
                    error = %err.message,
                    "Storage step failed"
                );
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}
