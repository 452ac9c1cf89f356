//! # Components
//!
//! - [`rate_limiting`] - token buckets, single-key and multi-tier limiters
//! - [`load_balancer`] - in-flight cap, overflow queue and handler deadline
//! - [`middleware`] - rate limiting in front of admission control
//! - [`cache`] - TTL response cache

pub mod cache;
pub mod load_balancer;
pub mod middleware;
pub mod rate_limiting;
