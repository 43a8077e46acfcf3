use std::future::Future;
use std::time::Duration;

use crate::{CardioError, Runnable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Delay grows by `factor` after each failed attempt, capped at `max_delay`.
    Exponential { factor: u32, max_delay: Duration },
}

/// How many times a run is attempted and how long to wait in between.
///
/// `max_attempts` counts every attempt including the first one, so a policy of
/// 10 against an operation that always fails invokes it exactly 10 times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                let multiplier = factor.max(1).saturating_pow(exponent);
                self.delay.saturating_mul(multiplier).min(max_delay)
            }
        }
    }
}

fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

pub fn is_retryable(error: &CardioError) -> bool {
    matches!(
        error,
        CardioError::LlmProvider(_)
            | CardioError::ToolCallFailed { .. }
            | CardioError::Timeout(_)
    )
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts have been made. The closure receives the
/// 1-based attempt number.
pub async fn retry_with_delay<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, CardioError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, CardioError>>,
{
    if policy.max_attempts == 0 {
        return Err(CardioError::MaxRetriesExceeded {
            max: 0,
            last_error: "no attempt was made".to_string(),
        });
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(output) => return Ok(output),
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(error);
                }

                if attempt == policy.max_attempts {
                    tracing::error!(attempt, %error, "retries exhausted");
                    return Err(CardioError::MaxRetriesExceeded {
                        max: policy.max_attempts,
                        last_error: error.to_string(),
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay_millis(delay),
                    %error,
                    "attempt failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

pub struct Retrying<R> {
    runnable: R,
    policy: RetryPolicy,
}

impl<R> Retrying<R> {
    pub fn new(runnable: R, policy: RetryPolicy) -> Self {
        Self { runnable, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &R {
        &self.runnable
    }
}

#[async_trait::async_trait]
impl<Input, Output, R> Runnable<Input, Output> for Retrying<R>
where
    Input: Send + Sync + Clone + 'static,
    Output: Send + 'static,
    R: Runnable<Input, Output>,
{
    async fn invoke(&self, input: Input) -> Result<Output, CardioError> {
        retry_with_delay(&self.policy, |_attempt| self.runnable.invoke(input.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_delay_saturates_instead_of_wrapping() {
        assert_eq!(delay_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(delay_millis(Duration::MAX), u64::MAX);
    }
}
