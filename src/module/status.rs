//! Module status reporting.

use serde::Serialize;

/// Lifecycle state of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Configured but not started.
    Initialized,

    /// Running normally.
    Running,

    /// Running with reduced functionality.
    Degraded {
        /// Reason for degradation.
        reason: String,
    },

    /// Not running.
    Stopped,
}

impl ModuleStatus {
    /// Returns `true` if the module is running normally.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the module is serving requests (running or degraded).
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Running | Self::Degraded { .. })
    }

    /// Returns `true` if the module is stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Degraded { reason } => write!(f, "degraded: {reason}"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(ModuleStatus::Running.is_healthy());
        assert!(ModuleStatus::Running.is_operational());

        let degraded = ModuleStatus::Degraded {
            reason: "drain task exited".to_string(),
        };
        assert!(!degraded.is_healthy());
        assert!(degraded.is_operational());
        assert_eq!(degraded.to_string(), "degraded: drain task exited");

        assert!(ModuleStatus::Stopped.is_stopped());
        assert!(!ModuleStatus::Initialized.is_operational());
    }

    #[test]
    fn test_serialize() {
        assert_eq!(
            serde_json::to_value(ModuleStatus::Running).unwrap(),
            serde_json::json!({"state": "running"})
        );
    }
}
