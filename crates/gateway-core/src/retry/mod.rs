//! Retries a fallible async action per a [`RetryPolicy`].

pub mod backoff;
pub mod policy;

pub use policy::{policy_for_provider, policy_for_request, RetryPolicy};

use std::future::Future;

use crate::error::GatewayError;

/// Runs `action`, retrying per `policy` on a retryable failure. Attempts are
/// numbered starting at 1; the loop stops at `max_attempts` and returns the
/// final error unchanged — no wrapping, no synthesized retry-exhausted
/// variant, matching the error-handling design's explicit "final error
/// returned unchanged."
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut action: F) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 1;
    loop {
        match action(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "action succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= policy.max_attempts || !policy.should_retry(&err) {
                    tracing::debug!(attempt, error = %err, "giving up, not retrying");
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// [`with_retry`] using the policy registered for `provider`.
pub async fn with_provider_retry<F, Fut, T>(provider: &str, action: F) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let policy = policy_for_provider(provider);
    with_retry(&policy, action).await
}
