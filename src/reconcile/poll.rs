use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::alicloud::AlicloudError;
use crate::error::{ReconcileError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(180);

/// Outcome of one probe of a remote entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// Target state observed.
    Ready(T),
    /// Entity is in an intermediate state; the reason is logged and reported on timeout.
    Pending(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { multiplier: f64, max_interval: Duration },
}

/// How long and how often to wait for a target state.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub backoff: Backoff,
    /// Vendor errors that count as "still in progress" rather than failure.
    pub retryable: fn(&AlicloudError) -> bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT)
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            backoff: Backoff::Fixed,
            retryable: AlicloudError::is_retryable,
        }
    }

    /// A `multiplier` below 1.0 (or NaN) is treated as 1.0.
    pub fn exponential(
        interval: Duration,
        multiplier: f64,
        max_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            interval,
            timeout,
            backoff: Backoff::Exponential {
                multiplier: multiplier.max(1.0),
                max_interval,
            },
            retryable: AlicloudError::is_retryable,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retryable(mut self, retryable: fn(&AlicloudError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                multiplier,
                max_interval,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let delay = self.interval.as_secs_f64() * factor;
                if !delay.is_finite() || delay >= max_interval.as_secs_f64() {
                    max_interval
                } else {
                    Duration::from_secs_f64(delay.max(0.0))
                }
            }
        }
    }
}

/// Probes until `Attempt::Ready` or the policy's timeout elapses.
///
/// The probe always runs at least once. A probe error aborts immediately
/// unless it wraps a vendor error the policy classifies as retryable.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    operation: &str,
    id: &str,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        let reason = match probe().await {
            Ok(Attempt::Ready(value)) => {
                tracing::debug!(operation, id, attempt, "target state reached");
                return Ok(value);
            }
            Ok(Attempt::Pending(reason)) => reason,
            Err(err) => match err.vendor_source() {
                Some(source) if (policy.retryable)(source) => source.to_string(),
                _ => return Err(err),
            },
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(ReconcileError::Timeout {
                operation: operation.to_string(),
                id: id.to_string(),
                timeout: policy.timeout,
                last_status: reason,
            });
        }

        let delay = policy
            .delay_for_attempt(attempt)
            .min(policy.timeout - elapsed);
        tracing::debug!(operation, id, attempt, %reason, ?delay, "waiting for target state");
        sleep(delay).await;
        attempt += 1;
    }
}
