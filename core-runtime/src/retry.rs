//! # Bounded Retry
//!
//! Fixed-delay retry used around session establishment and tree refreshes.
//!
//! A failed attempt is retried up to `max_extra_attempts` more times with
//! `delay` between attempts. Cancellation is never retried: an error that
//! reports [`Retryable::is_cancelled`] is returned at once, and a token
//! cancelled before an attempt or during the delay ends the loop with
//! [`Retryable::cancelled`].
//!
//! ```ignore
//! use core_runtime::retry::{retry_with_policy, RetryPolicy};
//!
//! let nodes = retry_with_policy(&RetryPolicy::default(), &cancel, "tree refresh", || async {
//!     backend.list_nodes(link, cancel.clone()).await.map_err(MegaError::from)
//! })
//! .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of additional attempts after the first failure
pub const DEFAULT_MAX_EXTRA_ATTEMPTS: u32 = 2;

/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_extra_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_extra_attempts: u32, delay: Duration) -> Self {
        Self {
            max_extra_attempts,
            delay,
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_extra_attempts.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXTRA_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Errors that can tell a cancellation apart from an ordinary failure.
pub trait Retryable {
    fn is_cancelled(&self) -> bool;

    /// Failures that another attempt cannot fix (missing collaborators).
    fn is_permanent(&self) -> bool {
        false
    }

    /// The error value reported when the token fires between attempts.
    fn cancelled() -> Self;
}

/// Run `operation` under `policy`, surfacing the last failure when exhausted.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let total = policy.total_attempts();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            debug!(operation = operation_name, "Cancelled before attempt");
            return Err(E::cancelled());
        }

        attempt += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if error.is_cancelled() {
            debug!(operation = operation_name, attempt, "Operation cancelled");
            return Err(error);
        }

        if error.is_permanent() {
            debug!(operation = operation_name, attempt, error = %error, "Permanent failure");
            return Err(error);
        }

        if attempt >= total {
            warn!(
                operation = operation_name,
                attempts = attempt,
                error = %error,
                "Operation failed, retries exhausted"
            );
            return Err(error);
        }

        warn!(
            operation = operation_name,
            attempt,
            max_attempts = total,
            delay_ms = policy.delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(operation = operation_name, "Cancelled while waiting to retry");
                return Err(E::cancelled());
            }
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
