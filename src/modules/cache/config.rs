//! Response cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of entries stored without an explicit TTL.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl.is_zero() {
            return Err("default_ttl must be greater than 0".to_string());
        }
        Ok(())
    }
}
