//! Module error types and result aliases.

use thiserror::Error;

/// Result type alias for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors that can occur during lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// Module failed to start.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Module is in an invalid state for the requested operation.
    #[error("invalid state: current={current}, expected={expected}")]
    InvalidState {
        /// Current state of the module.
        current: String,
        /// Expected state for the operation.
        expected: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModuleError::InvalidState {
            current: "stopped".to_string(),
            expected: "running".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid state: current=stopped, expected=running"
        );
        assert_eq!(
            ModuleError::StartFailed("no runtime".into()).to_string(),
            "start failed: no runtime"
        );
    }
}
