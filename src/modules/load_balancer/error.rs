//! Load balancer error types.

use thiserror::Error;

/// Errors that can occur in the queue and load balancer.
///
/// Admission outcomes (overload, timeout) are not errors; they are reported
/// as [`Rejection`](crate::outcome::Rejection) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadBalancerError {
    /// The queue was closed and accepts no more requests.
    #[error("request queue is closed")]
    QueueClosed,

    /// The drain task is already running.
    #[error("queue drain task already running")]
    AlreadyDraining,

    /// No tokio runtime is available to spawn onto.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Result type for load balancer operations.
pub type LoadBalancerResult<T> = Result<T, LoadBalancerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LoadBalancerError::QueueClosed.to_string(),
            "request queue is closed"
        );
        let err = LoadBalancerError::ConfigError("max_queue_size must be greater than 0".into());
        assert_eq!(
            err.to_string(),
            "configuration error: max_queue_size must be greater than 0"
        );
    }
}
