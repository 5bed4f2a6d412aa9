//! Retry policy: which errors to retry and how long to wait between attempts.

use std::sync::Arc;
use std::time::Duration;

use crate::error::GatewayError;
use crate::options::{RequestOptions, RetryBackoff};

/// A predicate deciding whether an error should be retried, beyond the
/// default error-kind table. Injectable so callers can widen or narrow
/// retryability without forking the policy.
pub type RetryPredicate = Arc<dyn Fn(&GatewayError) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
    pub backoff: RetryBackoff,
    pub retry_on: RetryPredicate,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("jitter", &self.jitter)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Default retryability: `timeout`, `network_error` (covers "connection
/// closed"), `rate_limited` (429), and `server_error` restricted to
/// `{500, 502, 503, 504}`. Everything else — missing API key, invalid
/// request, authentication, 4xx other than 429 — is non-retryable.
fn default_retry_on(error: &GatewayError) -> bool {
    match error {
        GatewayError::Timeout(_) | GatewayError::NetworkError(_) | GatewayError::RateLimited { .. } => true,
        GatewayError::ServerError { status, .. } => matches!(status, 500 | 502 | 503 | 504),
        _ => false,
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
            backoff: RetryBackoff::Exponential,
            retry_on: Arc::new(default_retry_on),
        }
    }
}

impl RetryPolicy {
    /// Anthropic's documented rate limits favor a larger base delay than
    /// the default policy.
    pub fn anthropic() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = match self.backoff {
            RetryBackoff::Exponential => self.multiplier,
            RetryBackoff::Linear => 1.0,
        };
        match self.backoff {
            RetryBackoff::Linear => {
                let base = self.base_delay.as_secs_f64() * attempt.max(1) as f64;
                let capped = base.min(self.max_delay.as_secs_f64());
                let factor = if self.jitter { 1.0 + fastrand::f64() * 0.25 } else { 1.0 };
                Duration::from_secs_f64(capped * factor)
            }
            RetryBackoff::Exponential => {
                super::backoff::delay_for_attempt(attempt, self.base_delay, multiplier, self.max_delay, self.jitter)
            }
        }
    }

    pub fn should_retry(&self, error: &GatewayError) -> bool {
        (self.retry_on)(error)
    }
}

/// Looks up the policy for `provider`, falling back to [`RetryPolicy::default`].
pub fn policy_for_provider(provider: &str) -> RetryPolicy {
    match provider {
        "anthropic" => RetryPolicy::anthropic(),
        _ => RetryPolicy::default(),
    }
}

/// The effective policy for a single call: the provider's default, with any
/// of `options`'s `retry*` fields overriding it. `retry: Some(false)` wins
/// over everything else and collapses the policy to a single attempt.
pub fn policy_for_request(provider: &str, options: &RequestOptions) -> RetryPolicy {
    let mut policy = policy_for_provider(provider);
    if let Some(max_attempts) = options.retry_count {
        policy.max_attempts = max_attempts;
    }
    if let Some(base_delay) = options.retry_delay {
        policy.base_delay = Duration::from_millis(base_delay);
    }
    if let Some(backoff) = options.retry_backoff {
        policy.backoff = backoff;
    }
    if let Some(jitter) = options.retry_jitter {
        policy.jitter = jitter;
    }
    if options.retry == Some(false) {
        policy.max_attempts = 1;
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_and_server_5xx_are_retryable() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&GatewayError::RateLimited { retry_after: None }));
        assert!(policy.should_retry(&GatewayError::ServerError {
            status: 503,
            message: "".into()
        }));
        assert!(!policy.should_retry(&GatewayError::ServerError {
            status: 404,
            message: "".into()
        }));
    }

    #[test]
    fn missing_api_key_and_auth_errors_never_retry() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(&GatewayError::MissingApiKey {
            provider: "openai".into()
        }));
        assert!(!policy.should_retry(&GatewayError::AuthenticationError("nope".into())));
    }

    #[test]
    fn anthropic_policy_has_larger_base_delay() {
        let default = RetryPolicy::default();
        let anthropic = RetryPolicy::anthropic();
        assert!(anthropic.base_delay > default.base_delay);
    }

    #[test]
    fn injected_predicate_can_widen_retryability() {
        let mut policy = RetryPolicy::default();
        policy.retry_on = Arc::new(|_| true);
        assert!(policy.should_retry(&GatewayError::InvalidRequest("x".into())));
    }

    #[test]
    fn request_options_override_attempts_delay_and_jitter() {
        let mut options = RequestOptions::default();
        options.retry_count = Some(5);
        options.retry_delay = Some(10);
        options.retry_jitter = Some(false);
        let policy = policy_for_request("openai", &options);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(10));
        assert!(!policy.jitter);
    }

    #[test]
    fn retry_false_collapses_to_a_single_attempt() {
        let mut options = RequestOptions::default();
        options.retry_count = Some(5);
        options.retry = Some(false);
        let policy = policy_for_request("openai", &options);
        assert_eq!(policy.max_attempts, 1);
    }
}
