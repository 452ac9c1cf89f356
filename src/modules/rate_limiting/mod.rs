//! # Rate Limiting Module
//!
//! Token-bucket rate limiting in two shapes:
//!
//! - [`RateLimiter`]: independent buckets keyed by `namespace:key`, with the
//!   limit and window chosen per call. Offers a plain decision
//!   ([`RateLimiter::acquire`]), a fail-fast form ([`RateLimiter::check`])
//!   and a wrapper that only runs work when a token was available
//!   ([`RateLimiter::run`]).
//! - [`TieredRateLimiter`]: seven buckets per request (global, user
//!   minute/hour/day, ip minute/hour/day) charged all-or-nothing.
//!
//! Buckets refill continuously at `limit / window` tokens per second and
//! hold at most `limit` tokens, so a client may burst up to `limit`
//! requests and then proceeds at the refill rate.
//!
//! ## Usage
//!
//! ```
//! use quota_gate::modules::rate_limiting::{RateLimitConfig, TieredRateLimiter};
//!
//! let limiter = TieredRateLimiter::new(RateLimitConfig::default());
//! if limiter.check("user-42", "203.0.113.7") {
//!     // forward the request
//! } else {
//!     let remaining = limiter.remaining_tokens("user-42", "203.0.113.7");
//!     // reply 429 with `remaining`
//! #   let _ = remaining;
//! }
//! ```

mod bucket;
mod config;
mod error;
mod limiter;
mod tiered;

pub use bucket::{TokenBucket, TokenBucketConfig};
pub use config::{GlobalLimit, IdentityLimits, RateLimitConfig};
pub use error::{RateLimitError, RateLimitResult};
pub use limiter::{RateLimitInfo, RateLimiter};
pub use tiered::{RemainingTokens, Tier, TierDecision, TieredRateLimiter};
