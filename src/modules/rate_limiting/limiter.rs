//! Single-tier rate limiter: independent token buckets keyed by
//! `namespace:key`.

use super::bucket::{TokenBucket, TokenBucketConfig};
use super::config::RateLimitConfig;
use super::error::{RateLimitError, RateLimitResult};
use crate::logging::millis;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Rate limit details returned alongside every decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitInfo {
    /// Whole tokens left after this decision.
    pub remaining: u64,

    /// Time from the decision until the next token is available.
    pub reset_after: Duration,

    /// Bucket capacity.
    pub limit: u64,

    /// Window the capacity refills over.
    pub window: Duration,
}

impl RateLimitInfo {
    /// Get retry-after in whole seconds, at least 1 (for HTTP headers).
    #[inline]
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs.saturating_add(1).max(1)
        } else {
            secs.max(1)
        }
    }
}

/// Entry in the bucket map.
#[derive(Debug)]
struct BucketEntry {
    bucket: TokenBucket,
    window: Duration,
    last_used: Instant,
}

/// Token-bucket limiter over arbitrary `(namespace, key)` pairs.
///
/// Buckets are created at full allotment on first reference; the limit and
/// window given on that first reference stay in force for the bucket's
/// lifetime. All buckets share one lock.
pub struct RateLimiter {
    /// Configuration.
    config: RateLimitConfig,

    /// Per-key token buckets.
    buckets: Mutex<HashMap<String, BucketEntry>>,

    /// Stats: total checks.
    total_checks: AtomicU64,

    /// Stats: total allowed.
    total_allowed: AtomicU64,

    /// Stats: total denied.
    total_denied: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("default_limit", &self.config.default_limit)
            .field("default_window", &self.config.default_window)
            .field("total_checks", &self.total_checks)
            .field("total_allowed", &self.total_allowed)
            .field("total_denied", &self.total_denied)
            .finish()
    }
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
            total_checks: AtomicU64::new(0),
            total_allowed: AtomicU64::new(0),
            total_denied: AtomicU64::new(0),
        }
    }

    /// Create a rate limiter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Try to take one token from the bucket for `namespace:key`.
    ///
    /// `limit` and `window` fall back to the configured defaults. A denied
    /// call consumes nothing and reports the time until one token is
    /// available.
    pub fn acquire(
        &self,
        key: &str,
        namespace: Option<&str>,
        limit: Option<u64>,
        window: Option<Duration>,
    ) -> (bool, RateLimitInfo) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        let limit = limit.unwrap_or(self.config.default_limit);
        let window = window.unwrap_or(self.config.default_window);
        let bucket_key = bucket_key(key, namespace);
        let now = Instant::now();

        let mut buckets = self.buckets.lock();
        let entry = buckets
            .entry(bucket_key)
            .or_insert_with(|| BucketEntry {
                bucket: TokenBucket::new_at(TokenBucketConfig::for_window(limit, window), now),
                window,
                last_used: now,
            });
        entry.last_used = now;

        let bucket = &mut entry.bucket;
        bucket.refill_at(now);

        let info_limit = bucket.max_tokens();
        if bucket.has_token() {
            bucket.consume_one();
            self.total_allowed.fetch_add(1, Ordering::Relaxed);
            let info = RateLimitInfo {
                remaining: bucket.tokens().floor() as u64,
                reset_after: bucket.token_interval(),
                limit: info_limit,
                window: entry.window,
            };
            (true, info)
        } else {
            self.total_denied.fetch_add(1, Ordering::Relaxed);
            let info = RateLimitInfo {
                remaining: 0,
                reset_after: bucket.time_until_available(1),
                limit: info_limit,
                window: entry.window,
            };
            debug!(
                key = %key,
                namespace = namespace.unwrap_or(""),
                retry_after_ms = millis(info.reset_after),
                "rate limit exceeded"
            );
            (false, info)
        }
    }

    /// Fail-fast form of [`acquire`](Self::acquire).
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Exceeded`] carrying the retry hint when no
    /// token is available.
    pub fn check(
        &self,
        key: &str,
        namespace: Option<&str>,
        limit: Option<u64>,
        window: Option<Duration>,
    ) -> RateLimitResult<RateLimitInfo> {
        match self.acquire(key, namespace, limit, window) {
            (true, info) => Ok(info),
            (false, info) => Err(RateLimitError::Exceeded {
                retry_after: info.reset_after,
            }),
        }
    }

    /// Run the future produced by `f` only if a token could be acquired.
    ///
    /// The bucket key is resolved once, before `f` is called.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Exceeded`] without calling `f` when the
    /// bucket is empty.
    pub async fn run<F, Fut, T>(
        &self,
        key: &str,
        namespace: Option<&str>,
        limit: Option<u64>,
        window: Option<Duration>,
        f: F,
    ) -> RateLimitResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.check(key, namespace, limit, window)?;
        Ok(f().await)
    }

    /// Remove buckets that have not been used for `max_idle`.
    pub fn cleanup(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();

        buckets.retain(|_, entry| now.saturating_duration_since(entry.last_used) < max_idle);

        let removed = before - buckets.len();
        if removed > 0 {
            debug!(removed, remaining = buckets.len(), "removed idle buckets");
        }
    }

    /// Drop every bucket.
    pub fn close(&self) {
        self.buckets.lock().clear();
    }

    /// Get the number of active buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Get total checks.
    #[must_use]
    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Relaxed)
    }

    /// Get total allowed.
    #[must_use]
    pub fn total_allowed(&self) -> u64 {
        self.total_allowed.load(Ordering::Relaxed)
    }

    /// Get total denied.
    #[must_use]
    pub fn total_denied(&self) -> u64 {
        self.total_denied.load(Ordering::Relaxed)
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

fn bucket_key(key: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{key}"),
        _ => key.to_string(),
    }
}
