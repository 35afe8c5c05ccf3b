//! Bounded linear-backoff retry for attach operations.
//!
//! Making an object visible right after its dependency was dropped or
//! replaced can race with the store's own background merges or running
//! queries, which hold a reference to the object for a short while. Only
//! that busy signature is retried; every other failure is final.

use crate::client::ExecutionClient;
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use std::time::Duration;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default backoff step. Attempt `i` waits `i * step` before running.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Retry policy for busy objects.
///
/// With the defaults the first attempt is immediate and the last one starts
/// after 45 s of cumulative backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
        }
    }

    /// Delay before the 0-based `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    /// Total time spent sleeping if every attempt is used.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts).map(|i| self.delay_before(i)).sum()
    }
}

/// Outcome of a successful attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The object was detached and is now attached.
    Attached { attempts: u32 },
    /// The object was already attached.
    AlreadyAttached { attempts: u32 },
}

impl AttachOutcome {
    pub fn attempts(self) -> u32 {
        match self {
            Self::Attached { attempts } | Self::AlreadyAttached { attempts } => attempts,
        }
    }
}

/// Attach `object`, retrying while the store reports it busy.
///
/// # Errors
///
/// - `SchemaOperation` for any non-busy failure (including "not found"),
///   returned on the attempt it occurred
/// - `AttachTimeout` once `policy.max_attempts` busy failures are seen
pub async fn attach_with_retry<C>(
    client: &C,
    object: &str,
    policy: &RetryPolicy,
) -> QuoteflowResult<AttachOutcome>
where
    C: ExecutionClient + ?Sized,
{
    let statement = format!("ATTACH TABLE {object}");

    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match client.execute(&statement).await {
            Ok(_) => {
                tracing::info!(object = %object, attempts = attempt + 1, "ATTACH ok");
                return Ok(AttachOutcome::Attached {
                    attempts: attempt + 1,
                });
            }
            Err(e) if e.is_already_exists() => {
                tracing::info!(object = %object, "ATTACH skipped (already attached)");
                return Ok(AttachOutcome::AlreadyAttached {
                    attempts: attempt + 1,
                });
            }
            Err(e) if e.is_busy() => {
                tracing::warn!(
                    object = %object,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    "Object still in use, retrying ATTACH"
                );
            }
            Err(e) => {
                tracing::debug!(object = %object, error = %e, "ATTACH failed");
                return Err(QuoteflowError::schema(format!("ATTACH {object}"), e));
            }
        }
    }

    tracing::error!(object = %object, "ATTACH timed out");
    Err(QuoteflowError::AttachTimeout {
        object: object.to_string(),
        attempts: policy.max_attempts,
    })
}
