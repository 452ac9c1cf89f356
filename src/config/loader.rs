//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::QuotaGateConfig;
use super::validation::{BasicValidator, Validator};
use std::path::Path;
use tracing::warn;

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
}

impl ConfigLoader {
    /// Create a loader without validators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader running the [`BasicValidator`].
    #[must_use]
    pub fn standard() -> Self {
        Self::new().with_validator(BasicValidator::new())
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<QuotaGateConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.load_str(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn load_str(&self, content: &str) -> ConfigResult<QuotaGateConfig> {
        let config: QuotaGateConfig = toml::from_str(content)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration against all registered validators.
    ///
    /// Warnings are logged; errors are joined into one
    /// [`ConfigError::ValidationError`].
    ///
    /// # Errors
    ///
    /// Returns an error if any validator reports an error.
    pub fn validate(&self, config: &QuotaGateConfig) -> ConfigResult<()> {
        for validator in &self.validators {
            let result = validator.validate(config);
            for warning in result.warnings() {
                warn!(field = %warning.field, "{}", warning.message);
            }
            if !result.is_valid() {
                let errors: Vec<String> = result
                    .errors_only()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                return Err(ConfigError::ValidationError(errors.join("; ")));
            }
        }
        Ok(())
    }

    /// Load configuration or return default if file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(&self, path: P) -> ConfigResult<QuotaGateConfig> {
        let path = path.as_ref();
        if path.exists() {
            self.load(path)
        } else {
            Ok(QuotaGateConfig::default())
        }
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, config: &QuotaGateConfig, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_string() {
        let config = ConfigLoader::standard()
            .load_str(
                r#"
            [queue]
            max_queue_size = 10
        "#,
            )
            .unwrap();
        assert_eq!(config.queue.max_queue_size, 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("quota-gate.toml");

        std::fs::write(
            &config_path,
            r#"
            [load_balancing]
            request_timeout = "2s"
        "#,
        )
        .unwrap();

        let config = ConfigLoader::standard().load(&config_path).unwrap();
        assert_eq!(config.load_balancing.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::new().load("/nonexistent/path/quota-gate.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default() {
        let config = ConfigLoader::new()
            .load_or_default("/nonexistent/path")
            .unwrap();
        assert_eq!(config, QuotaGateConfig::default());
    }

    #[test]
    fn test_malformed_toml() {
        let result = ConfigLoader::new().load_str("[queue\nmax_queue_size = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let result = ConfigLoader::standard().load_str(
            r#"
            [queue]
            max_retries = 42
        "#,
        );
        match result {
            Err(ConfigError::ValidationError(message)) => {
                assert!(message.starts_with("queue: max_retries"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        // Without validators the same document loads.
        assert!(ConfigLoader::new()
            .load_str("[queue]\nmax_retries = 42")
            .is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("saved.toml");

        let mut config = QuotaGateConfig::default();
        config.queue.retry_delay = Duration::from_secs(9);
        config.rate_limit.global.limit = 120;

        let loader = ConfigLoader::standard();
        loader.save(&config, &config_path).unwrap();

        let loaded = loader.load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }
}
