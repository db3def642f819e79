//! Generic retry-with-backoff for transfers, interruptible by cancellation.
//!
//! A failed attempt waits `cooldown * exponent^attempt_index` before the next
//! one (defaults 0.2s / 4.0 → 0.2s, 0.8s, 3.2s, ...). Both the operation
//! itself and the backoff wait race against the cancellation token so a
//! cancelled run returns promptly instead of riding out a timer.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default maximum attempts per transfer.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 7;

/// Default base cooldown before the first retry.
const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// Default backoff multiplier applied per attempt.
const DEFAULT_EXPONENT: f64 = 4.0;

/// Retry configuration: attempt budget and backoff curve.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    cooldown: Duration,
    exponent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_COOLDOWN,
            exponent: DEFAULT_EXPONENT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, cooldown: Duration, exponent: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
            exponent,
        }
    }

    /// Returns the attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the attempt following `attempt_index` (0-indexed):
    /// `cooldown * exponent^attempt_index`.
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.cooldown
            .mul_f64(self.exponent.powi(attempt_index as i32))
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The run was cancelled during an attempt or a backoff wait.
    #[error("cancelled")]
    Cancelled,

    /// Every attempt failed; carries the last error.
    #[error("all {attempts} attempts failed: {error}")]
    Exhausted {
        /// The error from the final attempt.
        error: E,
        /// How many attempts were made.
        attempts: u32,
    },
}

/// Runs `op` up to the policy's attempt budget with exponential backoff.
///
/// Cancellation is observed both while an attempt is in flight and during
/// backoff waits; it wins the race immediately.
///
/// # Errors
///
/// [`RetryError::Cancelled`] when the token fires first;
/// [`RetryError::Exhausted`] with the last error when the budget runs out.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_error: Option<E> = None;

    for attempt_index in 0..policy.max_attempts() {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let result = tokio::select! {
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = op() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) => {
                debug!(
                    attempt = attempt_index + 1,
                    max_attempts = policy.max_attempts(),
                    error = %error,
                    "attempt failed"
                );
                last_error = Some(error);
            }
        }

        if attempt_index + 1 < policy.max_attempts() {
            let delay = policy.delay_for(attempt_index);
            tokio::select! {
                () = cancel.cancelled() => return Err(RetryError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    match last_error {
        Some(error) => Err(RetryError::Exhausted {
            error,
            attempts: policy.max_attempts(),
        }),
        // max_attempts >= 1 guarantees at least one recorded error.
        None => Err(RetryError::Cancelled),
    }
}
