use async_trait::async_trait;

use crate::{CardioError, RetryPolicy, Retrying};

#[async_trait]
pub trait Runnable<Input: Send + 'static, Output: Send + 'static>: Send + Sync {
    async fn invoke(&self, input: Input) -> Result<Output, CardioError>;
}

pub trait RunnableExt<Input: Send + 'static, Output: Send + 'static>:
    Runnable<Input, Output> + Sized
{
    /// Wraps `self` so that retryable failures are re-run without delay, up to
    /// `max_attempts` total attempts.
    fn with_retries(self, max_attempts: usize) -> Retrying<Self> {
        Retrying::new(self, RetryPolicy::immediate(max_attempts))
    }

    fn with_retry_policy(self, policy: RetryPolicy) -> Retrying<Self> {
        Retrying::new(self, policy)
    }
}

impl<Input: Send + 'static, Output: Send + 'static, T> RunnableExt<Input, Output> for T where
    T: Runnable<Input, Output> + Sized
{
}
