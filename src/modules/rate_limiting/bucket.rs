//! Token bucket implementation for rate limiting.
//!
//! Buckets are plain values: every caller in this crate keeps them behind the
//! owning limiter's lock, so the refill/consume sequence of a decision is
//! never interleaved with another decision on the same bucket.

use std::time::Duration;
use tokio::time::Instant;

/// Configuration for a token bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucketConfig {
    /// Maximum tokens (burst capacity).
    pub max_tokens: u64,

    /// Token refill rate (tokens per second).
    pub refill_rate: f64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self::for_window(100, Duration::from_secs(60))
    }
}

impl TokenBucketConfig {
    /// Create a new token bucket configuration.
    #[must_use]
    pub fn new(max_tokens: u64, refill_rate: f64) -> Self {
        Self {
            max_tokens,
            refill_rate,
        }
    }

    /// Configuration admitting `limit` requests per `window`.
    ///
    /// The refill rate is `limit / window` tokens per second.
    #[must_use]
    pub fn for_window(limit: u64, window: Duration) -> Self {
        let secs = window.as_secs_f64();
        let refill_rate = if secs > 0.0 { limit as f64 / secs } else { 0.0 };
        Self::new(limit, refill_rate)
    }
}

/// A refillable token counter.
///
/// Invariant: after any refill, `0 <= tokens <= max_tokens`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    config: TokenBucketConfig,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new token bucket holding its full allotment.
    #[must_use]
    pub fn new(config: TokenBucketConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    #[must_use]
    pub fn new_at(config: TokenBucketConfig, now: Instant) -> Self {
        Self {
            tokens: config.max_tokens as f64,
            config,
            last_refill: now,
        }
    }

    /// Create a token bucket with specific rate and burst.
    #[must_use]
    pub fn with_rate(max_tokens: u64, refill_rate: f64) -> Self {
        Self::new(TokenBucketConfig::new(max_tokens, refill_rate))
    }

    /// Create a token bucket admitting `limit` requests per `window`.
    #[must_use]
    pub fn for_window(limit: u64, window: Duration) -> Self {
        Self::new(TokenBucketConfig::for_window(limit, window))
    }

    /// Refill tokens based on the time elapsed since the last refill.
    pub fn refill(&mut self) {
        self.refill_at(Instant::now());
    }

    /// Refill as of `now`. Instants earlier than the last refill are ignored.
    pub fn refill_at(&mut self, now: Instant) {
        self.tokens = self.projected_tokens(now);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Balance the bucket would hold at `now`, without refilling it.
    #[must_use]
    pub fn projected_tokens(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.config.refill_rate).min(self.config.max_tokens as f64)
    }

    /// Whether at least one whole token is available (as of the last refill).
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.tokens >= 1.0
    }

    /// Spend one token. Callers check [`has_token`](Self::has_token) first.
    pub fn consume_one(&mut self) {
        debug_assert!(self.has_token(), "consume_one on an empty bucket");
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    /// Refill, then try to consume `tokens` tokens.
    ///
    /// Returns `true` if tokens were consumed, `false` if not enough tokens;
    /// nothing is consumed on failure.
    pub fn try_consume(&mut self, tokens: u64) -> bool {
        self.refill();

        let needed = tokens as f64;
        if self.tokens < needed {
            return false;
        }
        self.tokens -= needed;
        true
    }

    /// Balance as of the last refill.
    #[must_use]
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Refill and return the current token count.
    pub fn available_tokens(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    /// Get the maximum tokens (burst capacity).
    #[must_use]
    pub fn max_tokens(&self) -> u64 {
        self.config.max_tokens
    }

    /// Get the refill rate (tokens per second).
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        self.config.refill_rate
    }

    /// Instant of the last refill.
    #[must_use]
    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// Time until `tokens` tokens are available, based on the balance as of
    /// the last refill.
    #[must_use]
    pub fn time_until_available(&self, tokens: u64) -> Duration {
        let needed = tokens as f64;
        if self.tokens >= needed {
            return Duration::ZERO;
        }
        if self.config.refill_rate <= 0.0 {
            return Duration::MAX;
        }

        let seconds = (needed - self.tokens) / self.config.refill_rate;
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Interval between two consecutive tokens.
    #[must_use]
    pub fn token_interval(&self) -> Duration {
        if self.config.refill_rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(1.0 / self.config.refill_rate).unwrap_or(Duration::MAX)
    }

    /// Get the fill ratio (0.0 to 1.0).
    #[must_use]
    pub fn fill_ratio(&self) -> f64 {
        if self.config.max_tokens == 0 {
            return 0.0;
        }
        self.tokens / self.config.max_tokens as f64
    }

    /// Reset the bucket to full capacity.
    pub fn reset(&mut self) {
        self.tokens = self.config.max_tokens as f64;
        self.last_refill = Instant::now();
    }
}
