//! Configuration for rate limiting.

use super::bucket::TokenBucketConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3_600);
const DAY: Duration = Duration::from_secs(86_400);

/// Main configuration for the rate limiting module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Limit used by single-tier `acquire` calls that do not pass one.
    pub default_limit: u64,

    /// Window used by single-tier `acquire` calls that do not pass one.
    #[serde(with = "humantime_serde")]
    pub default_window: Duration,

    /// Upper bound on bucket sets kept per identity class (users, IPs).
    /// The least recently seen identity is evicted beyond this.
    pub max_tracked_identities: usize,

    /// The process-wide bucket shared by every request.
    pub global: GlobalLimit,

    /// Per-user limits.
    pub user: IdentityLimits,

    /// Per-source-address limits.
    pub ip: IdentityLimits,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            default_window: MINUTE,
            max_tracked_identities: 10_000,
            global: GlobalLimit::default(),
            user: IdentityLimits {
                per_minute: 2,
                per_hour: 60,
                per_day: 300,
            },
            ip: IdentityLimits {
                per_minute: 10,
                per_hour: 200,
                per_day: 500,
            },
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global limit.
    #[must_use]
    pub fn with_global(mut self, limit: u64, window: Duration) -> Self {
        self.global = GlobalLimit { limit, window };
        self
    }

    /// Set the per-user limits.
    #[must_use]
    pub fn with_user_limits(mut self, limits: IdentityLimits) -> Self {
        self.user = limits;
        self
    }

    /// Set the per-IP limits.
    #[must_use]
    pub fn with_ip_limits(mut self, limits: IdentityLimits) -> Self {
        self.ip = limits;
        self
    }

    /// Set the single-tier defaults.
    #[must_use]
    pub fn with_defaults(mut self, limit: u64, window: Duration) -> Self {
        self.default_limit = limit;
        self.default_window = window;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_limit == 0 {
            return Err("default_limit must be greater than 0".to_string());
        }
        if self.default_window.is_zero() {
            return Err("default_window must be greater than 0".to_string());
        }

        self.global.validate().map_err(|e| format!("global: {e}"))?;
        self.user.validate().map_err(|e| format!("user: {e}"))?;
        self.ip.validate().map_err(|e| format!("ip: {e}"))?;

        if self.max_tracked_identities == 0 {
            return Err("max_tracked_identities must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// The single global bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalLimit {
    /// Requests admitted per window.
    pub limit: u64,

    /// Window length.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for GlobalLimit {
    fn default() -> Self {
        // Slightly under a 2000 RPM upstream quota.
        Self {
            limit: 1900,
            window: MINUTE,
        }
    }
}

impl GlobalLimit {
    /// Bucket configuration for the global tier.
    #[must_use]
    pub fn bucket_config(&self) -> TokenBucketConfig {
        TokenBucketConfig::for_window(self.limit, self.window)
    }

    /// Validate the limit.
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("limit must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Minute/hour/day limits for one identity class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLimits {
    /// Requests per minute.
    pub per_minute: u64,

    /// Requests per hour.
    pub per_hour: u64,

    /// Requests per day.
    pub per_day: u64,
}

impl IdentityLimits {
    /// Create a new set of limits.
    #[must_use]
    pub fn new(per_minute: u64, per_hour: u64, per_day: u64) -> Self {
        Self {
            per_minute,
            per_hour,
            per_day,
        }
    }

    /// Bucket configurations in minute, hour, day order.
    #[must_use]
    pub fn bucket_configs(&self) -> [TokenBucketConfig; 3] {
        [
            TokenBucketConfig::for_window(self.per_minute, MINUTE),
            TokenBucketConfig::for_window(self.per_hour, HOUR),
            TokenBucketConfig::for_window(self.per_day, DAY),
        ]
    }

    /// Validate the limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.per_minute == 0 || self.per_hour == 0 || self.per_day == 0 {
            return Err("per_minute, per_hour and per_day must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Whether a longer window allows fewer requests than a shorter one.
    ///
    /// Not an error, but the shorter window can then never be the limiting
    /// factor.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.per_hour < self.per_minute || self.per_day < self.per_hour
    }
}
