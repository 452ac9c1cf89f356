//! # Configuration System
//!
//! TOML-based configuration with typed sections and validation. Durations
//! use humantime notation (`"30s"`, `"100ms"`, `"1h"`).
//!
//! ## Example Configuration
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "pretty"
//!
//! [rate_limit.global]
//! limit = 1900
//! window = "60s"
//!
//! [rate_limit.user]
//! per_minute = 2
//! per_hour = 60
//! per_day = 300
//!
//! [queue]
//! max_queue_size = 5000
//! queue_timeout = "30s"
//! retry_delay = "5s"
//!
//! [load_balancing]
//! max_requests_in_flight = 1900
//! request_timeout = "15s"
//! timeout_policy = "detach"
//!
//! [cache]
//! default_ttl = "1h"
//! ```
//!
//! Every section and field is optional and falls back to its default.

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{LogFormat, LogLevel, LogOutput, LoggingConfig, QuotaGateConfig};
pub use validation::{
    BasicValidator, ValidationError, ValidationResult, ValidationSeverity, Validator,
};
