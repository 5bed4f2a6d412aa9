use std::time::Duration;

/// The closed taxonomy of failures the gateway surfaces to callers.
///
/// Every plug, adapter, and subsystem in this crate eventually reports one of
/// these kinds; nothing escapes as a raw `anyhow`/`Box<dyn Error>` once it
/// crosses the facade boundary. `kind()` gives pipeline/retry/circuit-breaker
/// code a small enum to match on without destructuring the whole error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("missing API key for provider {provider}")]
    MissingApiKey { provider: String },

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("context too large: {tokens} tokens over budget of {limit}")]
    ContextTooLarge { tokens: usize, limit: usize },

    #[error("authentication error: {0}")]
    AuthenticationError(String),

    #[error("rate limited{}", .retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("bulkhead queue wait exceeded for circuit '{0}'")]
    BulkheadTimeout(String),

    #[error("stream parse error: {0}")]
    StreamParseError(String),

    #[error("recoverable stream error: {reason} (recovery id {recovery_id})")]
    RecoverableStreamError {
        reason: String,
        recovery_id: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("operation not supported: {0}")]
    NotSupported(String),
}

/// The closed set of error kinds from the error-handling design, independent
/// of the payload each variant carries. Useful for `match`-free dispatch in
/// retry/circuit-breaker code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingApiKey,
    UnsupportedProvider,
    InvalidRequest,
    ContextTooLarge,
    AuthenticationError,
    RateLimited,
    ServerError,
    NetworkError,
    Timeout,
    CircuitOpen,
    BulkheadTimeout,
    StreamParseError,
    RecoverableStreamError,
    Cancelled,
    NotSupported,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::MissingApiKey { .. } => ErrorKind::MissingApiKey,
            GatewayError::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GatewayError::ContextTooLarge { .. } => ErrorKind::ContextTooLarge,
            GatewayError::AuthenticationError(_) => ErrorKind::AuthenticationError,
            GatewayError::RateLimited { .. } => ErrorKind::RateLimited,
            GatewayError::ServerError { .. } => ErrorKind::ServerError,
            GatewayError::NetworkError(_) => ErrorKind::NetworkError,
            GatewayError::Timeout(_) => ErrorKind::Timeout,
            GatewayError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            GatewayError::BulkheadTimeout(_) => ErrorKind::BulkheadTimeout,
            GatewayError::StreamParseError(_) => ErrorKind::StreamParseError,
            GatewayError::RecoverableStreamError { .. } => ErrorKind::RecoverableStreamError,
            GatewayError::Cancelled => ErrorKind::Cancelled,
            GatewayError::NotSupported(_) => ErrorKind::NotSupported,
        }
    }

    /// Default retryability per the error-kind table in the error-handling
    /// design. `circuit_open` is "no, but backs off" — the retry engine
    /// never retries it directly, the circuit breaker's own timer does.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::ServerError | ErrorKind::NetworkError | ErrorKind::Timeout
        )
    }

    /// Maps a non-2xx HTTP response to the right taxonomy member: 429 is
    /// `RateLimited` (carrying `Retry-After` if the provider sent one), 401
    /// and 403 are `AuthenticationError`, everything else is `ServerError`.
    /// Every provider adapter's wire-format module routes its error
    /// responses through this rather than reporting raw statuses as
    /// `ServerError`, so retry/circuit-breaker logic sees the real kind.
    pub fn from_http_status(status: u16, retry_after: Option<Duration>, message: String) -> GatewayError {
        match status {
            429 => GatewayError::RateLimited { retry_after },
            401 | 403 => GatewayError::AuthenticationError(message),
            _ => GatewayError::ServerError { status, message },
        }
    }
}

/// Parses a `Retry-After` header into a [`Duration`]. Supports the
/// delay-seconds form (`Retry-After: 30`); an HTTP-date form is not seconds
/// since now without a clock reference, so it's treated as absent rather
/// than guessed at.
pub fn parse_retry_after(headers: &http::HeaderMap) -> Option<Duration> {
    headers
        .get(http::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else {
            GatewayError::NetworkError(err.to_string())
        }
    }
}

impl From<http::Error> for GatewayError {
    fn from(err: http::Error) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::StreamParseError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::InvalidRequest(format!("invalid url: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_maps_to_rate_limited_with_retry_after() {
        let err = GatewayError::from_http_status(429, Some(Duration::from_secs(10)), "slow down".into());
        assert!(matches!(err, GatewayError::RateLimited { retry_after: Some(d) } if d.as_secs() == 10));
        assert!(err.is_retryable_by_default());
    }

    #[test]
    fn status_401_and_403_map_to_authentication_error() {
        for status in [401, 403] {
            let err = GatewayError::from_http_status(status, None, "nope".into());
            assert!(matches!(err, GatewayError::AuthenticationError(_)));
            assert!(!err.is_retryable_by_default());
        }
    }

    #[test]
    fn other_statuses_remain_server_error() {
        let err = GatewayError::from_http_status(503, None, "busy".into());
        assert!(matches!(err, GatewayError::ServerError { status: 503, .. }));
    }

    #[test]
    fn retry_after_header_parses_delay_seconds() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, "42".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(42)));
    }

    #[test]
    fn missing_retry_after_header_is_none() {
        assert_eq!(parse_retry_after(&http::HeaderMap::new()), None);
    }
}
