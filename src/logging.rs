//! Logging bootstrap for the binary, plus field helpers shared by the
//! modules' log statements.

use crate::config::{LogFormat, LogOutput, LoggingConfig};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already set, or installation failed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Milliseconds in `duration` as a log field, saturating at `u64::MAX`.
#[must_use]
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Build the filter: `RUST_LOG` when set and valid, otherwise the configured
/// level.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
}

/// Install the global `tracing` subscriber described by `config`.
///
/// # Errors
///
/// Fails if a global subscriber has already been installed.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(writer);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}
