use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::MarketDataError;

/// Exponential backoff for transient provider failures.
///
/// Retry `n` (1-based) waits `base_delay * 2^n`, so the default policy sleeps
/// 2s, 4s and 8s before giving up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// the policy's retries are used up.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, MarketDataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketDataError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, error = %err, "transient market data failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
