//! Queue and load balancer configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Configuration for the request queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of waiting requests.
    pub max_queue_size: usize,

    /// How long an enqueue may wait for room before the request is rejected.
    #[serde(with = "humantime_serde")]
    pub queue_timeout: Duration,

    /// Retry hint attached to every rejection.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Advisory retry count for callers. Never acted on internally.
    pub max_retries: u32,

    /// Pause of the drain task when the queue runs empty.
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 5000,
            queue_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
            max_retries: 3,
            drain_interval: Duration::from_millis(100),
        }
    }
}

impl QueueConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than 0".to_string());
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(format!(
                "max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            ));
        }
        Ok(())
    }
}

/// What happens to a handler whose request timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutPolicy {
    /// The handler keeps running in its own task; its result is discarded.
    #[default]
    Detach,
    /// The handler future is dropped when the timeout fires.
    Cancel,
}

/// Configuration for the admission controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Concurrency cap on executing handlers.
    pub max_requests_in_flight: usize,

    /// Deadline for a single handler execution.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Behaviour on handler timeout.
    pub timeout_policy: TimeoutPolicy,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            max_requests_in_flight: 1900,
            request_timeout: Duration::from_secs(15),
            timeout_policy: TimeoutPolicy::Detach,
        }
    }
}

impl LoadBalancerConfig {
    /// Set the concurrency cap.
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_requests_in_flight = max;
        self
    }

    /// Set the handler deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the timeout policy.
    #[must_use]
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests_in_flight == 0 {
            return Err("max_requests_in_flight must be greater than 0".to_string());
        }
        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
