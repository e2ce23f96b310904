//! Centralized Error Handling Module
//!
//! Every upstream failure is classified into exactly one [`ErrorKind`].
//! The kind decides retry eligibility, the stable code string that lands
//! in logs, and the HTTP status the route layer answers with.
//!
//! Error codes follow pattern: UPSTREAM_xxx / CACHE_xxx

use std::fmt;

/// Failure classification shared by the whole data layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Attempt did not finish before the guard's timer fired
    Timeout,
    /// DNS, connect, reset, or body read failure
    Transport,
    /// Upstream answered with a status configured as transient (502/503/504-class)
    RetryableStatus,
    /// Upstream answered definitively with a non-2xx status (4xx, ...)
    NonRetryableStatus,
    /// Fetch failed and no fallback value exists
    CacheMiss,
    /// 2xx response whose body does not decode into the expected payload
    InvalidPayload,
}

impl ErrorKind {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "UPSTREAM_TIMEOUT",
            Self::Transport => "UPSTREAM_TRANSPORT",
            Self::RetryableStatus => "UPSTREAM_RETRYABLE_STATUS",
            Self::NonRetryableStatus => "UPSTREAM_STATUS",
            Self::CacheMiss => "CACHE_MISS",
            Self::InvalidPayload => "UPSTREAM_INVALID_PAYLOAD",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Timeout => 504,
            Self::CacheMiss => 503,
            _ => 502,
        }
    }

    /// Transient kinds that the retry loop may try again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport | Self::RetryableStatus
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error crossing the Fetch-With-Retry boundary
#[derive(Debug)]
pub struct FetchError {
    /// Classification
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Last HTTP status observed, `None` when upstream never responded
    pub status: Option<u16>,
    /// Attempts made before giving up (0 until the retry loop tags it)
    pub attempts: u32,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            attempts: 0,
            source: None,
        }
    }

    /// Create FetchError with source error
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(kind, message)
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("No response within {}ms", after.as_millis()),
        )
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, msg)
    }

    /// Upstream answered with a status the caller configured as transient
    pub fn retryable_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(ErrorKind::RetryableStatus, format!("Upstream returned HTTP {}", status))
        }
    }

    /// Upstream answered definitively
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(ErrorKind::NonRetryableStatus, format!("Upstream returned HTTP {}", status))
        }
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPayload, msg)
    }

    /// Tag with the number of attempts the retry loop made
    pub fn after_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// True when at least the last attempt got an HTTP answer
    /// ("upstream finally errored" vs "upstream never responded")
    pub fn upstream_responded(&self) -> bool {
        self.status.is_some()
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.kind.as_str()
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if self.attempts > 1 {
            write!(f, " (after {} attempts)", self.attempts)?;
        }
        Ok(())
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Data layer Result type
pub type FetchResult<T> = Result<T, FetchError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorKind::Timeout, "Request timeout")
        } else if err.is_connect() {
            Self::with_source(ErrorKind::Transport, "Connection failed", err)
        } else {
            let message = err.to_string();
            Self::with_source(ErrorKind::Transport, message, err)
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::InvalidPayload, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FetchError::timeout(std::time::Duration::from_secs(10));
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.code_str(), "UPSTREAM_TIMEOUT");
        assert!(!err.upstream_responded());
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Transport.is_transient());
        assert!(ErrorKind::RetryableStatus.is_transient());
        assert!(!ErrorKind::NonRetryableStatus.is_transient());
        assert!(!ErrorKind::InvalidPayload.is_transient());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorKind::Timeout.http_status(), 504);
        assert_eq!(ErrorKind::CacheMiss.http_status(), 503);
        assert_eq!(ErrorKind::NonRetryableStatus.http_status(), 502);
    }

    #[test]
    fn test_status_errors_remember_status() {
        let err = FetchError::retryable_status(503).after_attempts(3);
        assert!(err.upstream_responded());
        assert_eq!(err.status, Some(503));
        assert_eq!(err.to_string(), "[UPSTREAM_RETRYABLE_STATUS] Upstream returned HTTP 503 (after 3 attempts)");
    }
}
