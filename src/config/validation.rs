//! Configuration validation system.

use super::types::QuotaGateConfig;

/// A single validation finding.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid.
    Error,
    /// Warning - configuration may have issues.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all findings.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only errors (not warnings).
    #[must_use]
    pub fn errors_only(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Error)
            .collect()
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any findings.
    fn validate(&self, config: &QuotaGateConfig) -> ValidationResult;
}

/// Built-in validator for basic configuration checks.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &QuotaGateConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        let sections = [
            ("rate_limit", config.rate_limit.validate()),
            ("queue", config.queue.validate()),
            ("load_balancing", config.load_balancing.validate()),
            ("cache", config.cache.validate()),
        ];
        for (section, outcome) in sections {
            if let Err(message) = outcome {
                result.add_error(ValidationError::error(section, message));
            }
        }

        for (field, limits) in [
            ("rate_limit.user", &config.rate_limit.user),
            ("rate_limit.ip", &config.rate_limit.ip),
        ] {
            if limits.is_inverted() {
                result.add_error(ValidationError::warning(
                    field,
                    "a longer window allows fewer requests than a shorter one",
                ));
            }
        }

        let in_flight = config.load_balancing.max_requests_in_flight as u64;
        if in_flight > config.rate_limit.global.limit {
            result.add_error(ValidationError::warning(
                "load_balancing.max_requests_in_flight",
                format!(
                    "{in_flight} in-flight slots exceed the global limit of {}",
                    config.rate_limit.global.limit
                ),
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::rate_limiting::IdentityLimits;

    #[test]
    fn test_basic_validator_valid() {
        let config = QuotaGateConfig::default();
        let result = BasicValidator::new().validate(&config);
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_max_retries_bound() {
        let mut config = QuotaGateConfig::default();
        config.queue.max_retries = 11;

        let result = BasicValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert_eq!(result.errors_only()[0].field, "queue");
        assert!(result.errors()[0].message.contains("max_retries"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = QuotaGateConfig::default();
        config.load_balancing.max_requests_in_flight = 0;
        config.rate_limit.global.limit = 0;

        let result = BasicValidator::new().validate(&config);
        assert_eq!(result.errors_only().len(), 2);
    }

    #[test]
    fn test_inverted_limits_warn() {
        let mut config = QuotaGateConfig::default();
        config.rate_limit.user = IdentityLimits::new(100, 10, 1000);

        let result = BasicValidator::new().validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.warnings()[0].field, "rate_limit.user");
    }

    #[test]
    fn test_in_flight_above_global_warns() {
        let mut config = QuotaGateConfig::default();
        config.load_balancing.max_requests_in_flight = 5000;

        let result = BasicValidator::new().validate(&config);
        assert!(result.is_valid());
        assert_eq!(
            result.warnings()[0].field,
            "load_balancing.max_requests_in_flight"
        );
    }

    #[test]
    fn test_validation_result_severity_filters() {
        let mut result = ValidationResult::new();
        result.add_error(ValidationError::error("field1", "error1"));
        result.add_error(ValidationError::warning("field2", "warning1"));

        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 2);
        assert_eq!(result.errors_only()[0].to_string(), "field1: error1");
        assert_eq!(result.warnings()[0].field, "field2");
    }
}
