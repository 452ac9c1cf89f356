//! Error types for rate limiting.

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations.
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Errors that can occur during rate limiting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitError {
    /// The bucket had no token; retry after the given duration.
    #[error("rate limit exceeded, retry in {:.1}s", .retry_after.as_secs_f64())]
    Exceeded {
        /// Time until a token becomes available.
        retry_after: Duration,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RateLimitError {
    /// Retry hint carried by an [`Exceeded`](Self::Exceeded) error.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Exceeded { retry_after } => Some(*retry_after),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Check if the error indicates a configuration problem.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RateLimitError::Exceeded {
            retry_after: Duration::from_millis(12_000),
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry in 12.0s");

        let err = RateLimitError::InvalidConfig("bad value".to_string());
        assert_eq!(err.to_string(), "invalid configuration: bad value");
    }

    #[test]
    fn test_retry_after() {
        let err = RateLimitError::Exceeded {
            retry_after: Duration::from_secs(3),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(
            RateLimitError::InvalidConfig("x".to_string()).retry_after(),
            None
        );
    }

    #[test]
    fn test_is_config_error() {
        assert!(RateLimitError::InvalidConfig("test".to_string()).is_config_error());
        assert!(!RateLimitError::Exceeded {
            retry_after: Duration::ZERO
        }
        .is_config_error());
    }
}
