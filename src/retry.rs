//! Retry/backoff policy for provisioning calls
//!
//! A rate-limited call is never retried in place. Provisioning steps are not
//! resumable halfway, so the rejection is turned into
//! [`ProvisionError::RateLimited`] and the driver replays the whole change
//! request once the provider delay plus a safety margin has passed.

use crate::error::ProvisionError;
use std::future::Future;
use std::time::Duration;

/// Margin added on top of the provider's `Retry-After`
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    safety_margin: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl RetryPolicy {
    pub fn new(safety_margin: Duration) -> Self {
        Self { safety_margin }
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Run one provisioning step, classifying rate-limit rejections
    ///
    /// Only rejections that carry a provider delay become
    /// [`ProvisionError::RateLimited`]; a 429 without `Retry-After` stays a
    /// terminal provisioning failure.
    pub async fn invoke<T, F>(&self, step: &'static str, call: F) -> Result<T, ProvisionError>
    where
        F: Future<Output = Result<T, ProvisionError>>,
    {
        match call.await {
            Err(ProvisionError::Provisioning(error)) => match error.retry_after() {
                Some(retry_after) => {
                    tracing::warn!(
                        "{} rate limited by provider, retry after {}s",
                        step,
                        retry_after.as_secs()
                    );
                    Err(ProvisionError::RateLimited { step, retry_after })
                }
                None => {
                    tracing::error!("{} failed: {}", step, error);
                    Err(ProvisionError::Provisioning(error))
                }
            },
            Err(other) => {
                tracing::error!("{} failed: {}", step, other);
                Err(other)
            }
            ok => ok,
        }
    }

    /// Delay before the whole change request is replayed
    pub fn reschedule_delay(&self, retry_after: Duration) -> Duration {
        retry_after + self.safety_margin
    }
}
