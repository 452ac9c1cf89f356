//! TTL response cache.

use super::config::CacheConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when `now + ttl` overflows.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Key/value cache with per-entry expiry.
///
/// Expired entries are removed by the `get` that finds them; there is no
/// background sweep, so [`len`](Self::len) may count entries that have
/// expired but not yet been read.
pub struct ResponseCache<V> {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("default_ttl", &self.default_ttl)
            .field("len", &self.entries.lock().len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache whose entries live `default_ttl` unless told otherwise.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl)
    }

    /// Look up a live entry. An expired entry is removed and reported as a
    /// miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let value = entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            entries.remove(key);
        }
        drop(entries);

        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Store `value` for `ttl` (or the default TTL). `None` stores nothing
    /// and leaves any existing entry untouched.
    pub fn set(&self, key: impl Into<String>, value: Option<V>, ttl: Option<Duration>) {
        let Some(value) = value else {
            return;
        };
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = Instant::now().checked_add(ttl);

        self.entries
            .lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Store `value` with the default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, Some(value), None);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Return the cached value for `key`, or run `f` and cache a `Some`
    /// result for `ttl` (or the default TTL).
    ///
    /// `f` should be idempotent: concurrent misses on the same key may each
    /// run it, and the last result stored wins.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        key: impl Into<String>,
        ttl: Option<Duration>,
        f: F,
    ) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        let key = key.into();
        if let Some(value) = self.get(&key) {
            return Some(value);
        }

        let value = f().await?;
        self.set(key, Some(value.clone()), ttl);
        Some(value)
    }

    /// Number of stored entries, expired ones included until read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
