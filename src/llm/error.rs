//! LLM error types with retry classification.
//!
//! Transient failures (rate limits, 5xx, network) are retried with backoff;
//! everything else is surfaced to the routing loop immediately.

use std::time::Duration;

/// Classification of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429 - retry with backoff
    RateLimited,
    /// 5xx - retry
    ServerError,
    /// 4xx other than 429 - permanent
    ClientError,
    /// Connection failed or timed out - retry
    NetworkError,
    /// Response body could not be understood - permanent
    ParseError,
}

impl LlmErrorKind {
    /// Check if this error kind is transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }

    fn base_delay(&self) -> Duration {
        match self {
            LlmErrorKind::RateLimited => Duration::from_secs(5),
            LlmErrorKind::ServerError => Duration::from_secs(2),
            _ => Duration::from_secs(1),
        }
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "Rate limited",
            LlmErrorKind::ServerError => "Server error",
            LlmErrorKind::ClientError => "Client error",
            LlmErrorKind::NetworkError => "Network error",
            LlmErrorKind::ParseError => "Parse error",
        };
        f.write_str(label)
    }
}

/// Error from an LLM API call.
#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    /// Delay requested by the server via `Retry-After`
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        let mut err = Self::new(classify_http_status(status), Some(status), body);
        if err.kind == LlmErrorKind::RateLimited {
            err.retry_after = retry_after;
        }
        err
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Delay before retry attempt `attempt` (0-based).
    ///
    /// Honors `Retry-After` when present, otherwise exponential backoff from
    /// a per-kind base with a small deterministic jitter, capped at 60s.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let delay_secs = self
            .kind
            .base_delay()
            .as_secs()
            .saturating_mul(2u64.saturating_pow(attempt));
        let jitter_range = delay_secs / 4;
        let jitter = if jitter_range > 0 {
            (attempt as u64 * 7) % jitter_range
        } else {
            0
        };

        Duration::from_secs((delay_secs + jitter).min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Retry policy for the LLM client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Upper bound on time spent retrying one request
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// No retries at all (used by tests).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            max_retry_duration: Duration::ZERO,
        }
    }

    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmErrorKind::RateLimited.is_transient());
        assert!(LlmErrorKind::ServerError.is_transient());
        assert!(LlmErrorKind::NetworkError.is_transient());
        assert!(!LlmErrorKind::ClientError.is_transient());
        assert!(!LlmErrorKind::ParseError.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(400), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let error = LlmError::from_status(429, "slow down".to_string(), None);
        let delays: Vec<_> = (0..3).map(|a| error.suggested_delay(a)).collect();
        assert!(delays[1] > delays[0]);
        assert!(delays[2] > delays[1]);
        assert!(error.suggested_delay(10).as_secs() <= 60);
    }

    #[test]
    fn test_retry_after_respected_for_rate_limits() {
        let error = LlmError::from_status(429, "x".to_string(), Some(Duration::from_secs(30)));
        assert_eq!(error.suggested_delay(0), Duration::from_secs(30));
        assert_eq!(error.suggested_delay(5), Duration::from_secs(30));

        let error = LlmError::from_status(500, "x".to_string(), Some(Duration::from_secs(30)));
        assert_eq!(error.retry_after, None);
    }

    #[test]
    fn test_display_includes_status() {
        let error = LlmError::from_status(401, "bad key".to_string(), None);
        assert_eq!(error.to_string(), "Client error (HTTP 401): bad key");
        let error = LlmError::network_error("refused".to_string());
        assert_eq!(error.to_string(), "Network error: refused");
    }

    #[test]
    fn test_should_retry_respects_attempts() {
        let config = RetryConfig::default();
        let transient = LlmError::from_status(503, String::new(), None);
        let permanent = LlmError::from_status(400, String::new(), None);
        assert!(config.should_retry(&transient, 0));
        assert!(!config.should_retry(&transient, 3));
        assert!(!config.should_retry(&permanent, 0));
        assert!(!RetryConfig::disabled().should_retry(&transient, 0));
    }
}
