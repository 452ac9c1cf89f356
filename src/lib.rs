//! # Quota Gate
//!
//! Traffic protection for a capacity-limited upstream.
//!
//! ## Features
//!
//! - Token-bucket rate limiting, single key or seven-tier (global, per-user
//!   and per-address over minute, hour and day windows)
//! - Admission control with a cap on in-flight handlers and a bounded
//!   overflow queue
//! - Per-handler deadline with detach or cancel on timeout
//! - TTL response cache for idempotent upstream calls
//!
//! ## Architecture
//!
//! [`modules::middleware::Middleware`] checks a request against the
//! [`modules::rate_limiting::TieredRateLimiter`] and then hands it to the
//! [`modules::load_balancer::LoadBalancer`]. Both answer with an
//! [`Outcome`]: the handler's response or a serializable [`Rejection`].
//! The middleware implements [`module::ModuleContract`] for lifecycle
//! management.

pub mod config;
pub mod logging;
pub mod module;
pub mod modules;
pub mod outcome;

pub use config::QuotaGateConfig;
pub use outcome::{Outcome, Rejection, RejectionKind};
