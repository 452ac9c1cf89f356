//! Multi-tier rate limiter.
//!
//! Every request is checked against seven buckets: one process-wide bucket,
//! three per-user buckets (minute, hour, day) and three per-address buckets.
//! A request is admitted only if all seven hold a token, in which case all
//! seven are charged; otherwise nothing is charged.

use super::bucket::TokenBucket;
use super::config::{IdentityLimits, RateLimitConfig};
use crate::logging::millis;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// One of the seven buckets a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Global,
    UserMinute,
    UserHour,
    UserDay,
    IpMinute,
    IpHour,
    IpDay,
}

impl Tier {
    /// All tiers, in evaluation order.
    pub const ALL: [Tier; 7] = [
        Tier::Global,
        Tier::UserMinute,
        Tier::UserHour,
        Tier::UserDay,
        Tier::IpMinute,
        Tier::IpHour,
        Tier::IpDay,
    ];

    /// Snake-case name, matching the [`RemainingTokens`] field names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::UserMinute => "user_minute",
            Self::UserHour => "user_hour",
            Self::UserDay => "user_day",
            Self::IpMinute => "ip_minute",
            Self::IpHour => "ip_hour",
            Self::IpDay => "ip_day",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-token balances of the seven buckets for one `(user, ip)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingTokens {
    pub global: u64,
    pub user_minute: u64,
    pub user_hour: u64,
    pub user_day: u64,
    pub ip_minute: u64,
    pub ip_hour: u64,
    pub ip_day: u64,
}

impl RemainingTokens {
    /// Balance for a single tier.
    #[must_use]
    pub fn get(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Global => self.global,
            Tier::UserMinute => self.user_minute,
            Tier::UserHour => self.user_hour,
            Tier::UserDay => self.user_day,
            Tier::IpMinute => self.ip_minute,
            Tier::IpHour => self.ip_hour,
            Tier::IpDay => self.ip_day,
        }
    }
}

/// Outcome of a multi-tier check.
#[derive(Debug, Clone, PartialEq)]
pub struct TierDecision {
    /// Whether the request was admitted (and charged).
    pub allowed: bool,

    /// First tier, in [`Tier::ALL`] order, that had no token.
    pub exhausted: Option<Tier>,

    /// Time until the exhausted tier regains one token. Zero when allowed.
    pub retry_after: Duration,
}

impl TierDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            exhausted: None,
            retry_after: Duration::ZERO,
        }
    }
}

/// Minute/hour/day buckets of one identity.
#[derive(Debug)]
struct WindowBuckets {
    minute: TokenBucket,
    hour: TokenBucket,
    day: TokenBucket,
    last_seen: Instant,
}

impl WindowBuckets {
    fn new_at(limits: &IdentityLimits, now: Instant) -> Self {
        let [minute, hour, day] = limits.bucket_configs();
        Self {
            minute: TokenBucket::new_at(minute, now),
            hour: TokenBucket::new_at(hour, now),
            day: TokenBucket::new_at(day, now),
            last_seen: now,
        }
    }

    fn refill_at(&mut self, now: Instant) {
        self.minute.refill_at(now);
        self.hour.refill_at(now);
        self.day.refill_at(now);
    }

    fn consume_one(&mut self) {
        self.minute.consume_one();
        self.hour.consume_one();
        self.day.consume_one();
    }

    fn projected(&self, now: Instant) -> [u64; 3] {
        [
            whole(self.minute.projected_tokens(now)),
            whole(self.hour.projected_tokens(now)),
            whole(self.day.projected_tokens(now)),
        ]
    }
}

/// Everything guarded by the limiter's lock.
struct TierState {
    global: TokenBucket,
    users: LruCache<String, WindowBuckets>,
    ips: LruCache<String, WindowBuckets>,
}

/// Seven-bucket limiter keyed by user id and source address.
///
/// All bucket state sits behind one lock; a check refills, tests and charges
/// the seven buckets without releasing it. Per-identity bucket sets live in
/// LRU maps capped at `max_tracked_identities` each; an evicted identity
/// starts over at its full allotment.
pub struct TieredRateLimiter {
    config: RateLimitConfig,
    state: Mutex<TierState>,
    total_checks: AtomicU64,
    total_allowed: AtomicU64,
    total_denied: AtomicU64,
}

impl std::fmt::Debug for TieredRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredRateLimiter")
            .field("global", &self.config.global)
            .field("user", &self.config.user)
            .field("ip", &self.config.ip)
            .field("total_checks", &self.total_checks)
            .field("total_allowed", &self.total_allowed)
            .field("total_denied", &self.total_denied)
            .finish()
    }
}

impl TieredRateLimiter {
    /// Create a limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_tracked_identities).unwrap_or(NonZeroUsize::MIN);
        let state = TierState {
            global: TokenBucket::new(config.global.bucket_config()),
            users: LruCache::new(capacity),
            ips: LruCache::new(capacity),
        };

        Self {
            config,
            state: Mutex::new(state),
            total_checks: AtomicU64::new(0),
            total_allowed: AtomicU64::new(0),
            total_denied: AtomicU64::new(0),
        }
    }

    /// Create a limiter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Admit and charge the request, or reject it without charging anything.
    pub fn check(&self, user_id: &str, ip: &str) -> bool {
        self.check_detailed(user_id, ip).allowed
    }

    /// Like [`check`](Self::check), also reporting which tier refused.
    pub fn check_detailed(&self, user_id: &str, ip: &str) -> TierDecision {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let user_limits = &self.config.user;
        let ip_limits = &self.config.ip;
        let user = state
            .users
            .get_or_insert_mut(user_id.to_owned(), || WindowBuckets::new_at(user_limits, now));
        let addr = state
            .ips
            .get_or_insert_mut(ip.to_owned(), || WindowBuckets::new_at(ip_limits, now));

        user.last_seen = now;
        addr.last_seen = now;

        state.global.refill_at(now);
        user.refill_at(now);
        addr.refill_at(now);

        let buckets: [&TokenBucket; 7] = [
            &state.global,
            &user.minute,
            &user.hour,
            &user.day,
            &addr.minute,
            &addr.hour,
            &addr.day,
        ];

        let exhausted = Tier::ALL
            .iter()
            .zip(buckets)
            .find(|(_, bucket)| !bucket.has_token())
            .map(|(tier, bucket)| (*tier, bucket.time_until_available(1)));

        if let Some((tier, retry_after)) = exhausted {
            drop(guard);
            self.total_denied.fetch_add(1, Ordering::Relaxed);
            debug!(
                user_id = %user_id,
                ip = %ip,
                tier = %tier,
                retry_after_ms = millis(retry_after),
                "request rate limited"
            );
            return TierDecision {
                allowed: false,
                exhausted: Some(tier),
                retry_after,
            };
        }

        state.global.consume_one();
        user.consume_one();
        addr.consume_one();
        drop(guard);

        self.total_allowed.fetch_add(1, Ordering::Relaxed);
        TierDecision::allowed()
    }

    /// Balances of the seven buckets projected to now.
    ///
    /// Read-only: no refill is stored and identity recency is untouched.
    /// Identities not currently tracked report their full allotment.
    #[must_use]
    pub fn remaining_tokens(&self, user_id: &str, ip: &str) -> RemainingTokens {
        let now = Instant::now();
        let state = self.state.lock();

        let [user_minute, user_hour, user_day] = state
            .users
            .peek(user_id)
            .map(|b| b.projected(now))
            .unwrap_or_else(|| full_allotment(&self.config.user));
        let [ip_minute, ip_hour, ip_day] = state
            .ips
            .peek(ip)
            .map(|b| b.projected(now))
            .unwrap_or_else(|| full_allotment(&self.config.ip));

        RemainingTokens {
            global: whole(state.global.projected_tokens(now)),
            user_minute,
            user_hour,
            user_day,
            ip_minute,
            ip_hour,
            ip_day,
        }
    }

    /// Drop identity bucket sets not seen for at least `max_idle`.
    ///
    /// Returns the number of identities dropped.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();

        let removed = purge_lru(&mut state.users, now, max_idle)
            + purge_lru(&mut state.ips, now, max_idle);
        if removed > 0 {
            debug!(
                removed,
                users = state.users.len(),
                ips = state.ips.len(),
                "purged idle identities"
            );
        }
        removed
    }

    /// Number of users currently tracked.
    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Number of source addresses currently tracked.
    #[must_use]
    pub fn tracked_ips(&self) -> usize {
        self.state.lock().ips.len()
    }

    #[must_use]
    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total_allowed(&self) -> u64 {
        self.total_allowed.load(Ordering::Relaxed)
    }

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

/// Identities are refreshed on every check, so LRU order is `last_seen`
/// order and idle entries sit at the cold end.
fn purge_lru(map: &mut LruCache<String, WindowBuckets>, now: Instant, max_idle: Duration) -> usize {
    let mut removed = 0;
    while let Some((_, buckets)) = map.peek_lru() {
        if now.saturating_duration_since(buckets.last_seen) < max_idle {
            break;
        }
        map.pop_lru();
        removed += 1;
    }
    removed
}

fn full_allotment(limits: &IdentityLimits) -> [u64; 3] {
    [limits.per_minute, limits.per_hour, limits.per_day]
}

fn whole(tokens: f64) -> u64 {
    tokens.floor().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MINUTE: Duration = Duration::from_secs(60);

    fn limiter(global: u64, user: IdentityLimits, ip: IdentityLimits) -> TieredRateLimiter {
        TieredRateLimiter::new(
            RateLimitConfig::new()
                .with_global(global, MINUTE)
                .with_user_limits(user)
                .with_ip_limits(ip),
        )
    }

    #[test]
    fn test_tier_names() {
        assert_eq!(Tier::ALL.len(), 7);
        assert_eq!(Tier::UserMinute.to_string(), "user_minute");
        assert_eq!(Tier::IpDay.as_str(), "ip_day");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_identity_reports_full_allotment() {
        let limiter = TieredRateLimiter::with_defaults();
        let remaining = limiter.remaining_tokens("nobody", "10.0.0.1");

        assert_eq!(
            remaining,
            RemainingTokens {
                global: 1900,
                user_minute: 2,
                user_hour: 60,
                user_day: 300,
                ip_minute: 10,
                ip_hour: 200,
                ip_day: 500,
            }
        );
        assert_eq!(limiter.tracked_users(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_charges_all_seven() {
        let limiter = TieredRateLimiter::with_defaults();
        assert!(limiter.check("alice", "10.0.0.1"));

        let remaining = limiter.remaining_tokens("alice", "10.0.0.1");
        for tier in Tier::ALL {
            let full = TieredRateLimiter::with_defaults()
                .remaining_tokens("x", "y")
                .get(tier);
            assert_eq!(remaining.get(tier), full - 1, "tier {tier}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_charges_nothing() {
        let limiter = TieredRateLimiter::with_defaults();
        assert!(limiter.check("alice", "10.0.0.1"));
        assert!(limiter.check("alice", "10.0.0.1"));
        let before = limiter.remaining_tokens("alice", "10.0.0.1");

        let decision = limiter.check_detailed("alice", "10.0.0.1");
        assert!(!decision.allowed);
        assert_eq!(decision.exhausted, Some(Tier::UserMinute));

        let after = limiter.remaining_tokens("alice", "10.0.0.1");
        assert_eq!(before, after);
        assert_eq!(after.global, 1898);
        assert_eq!(after.ip_minute, 8);
        assert_eq!(limiter.total_denied(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_and_refill() {
        let limiter = TieredRateLimiter::with_defaults();
        assert!(limiter.check("alice", "10.0.0.1"));
        assert!(limiter.check("alice", "10.0.0.1"));

        // 2 per minute refills one token every 30s.
        let decision = limiter.check_detailed("alice", "10.0.0.1");
        assert!((decision.retry_after.as_secs_f64() - 30.0).abs() < 1e-6);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.check("alice", "10.0.0.1"));
        assert!(!limiter.check("alice", "10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_tier_never_refills() {
        let limiter = limiter(
            0,
            IdentityLimits::new(2, 60, 300),
            IdentityLimits::new(10, 200, 500),
        );

        let decision = limiter.check_detailed("alice", "10.0.0.1");
        assert!(!decision.allowed);
        assert_eq!(decision.exhausted, Some(Tier::Global));
        assert_eq!(decision.retry_after, Duration::MAX);
        assert_eq!(limiter.total_denied(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_tokens_is_read_only() {
        let limiter = TieredRateLimiter::with_defaults();
        assert!(limiter.check("alice", "10.0.0.1"));
        assert!(limiter.check("alice", "10.0.0.1"));

        tokio::time::advance(Duration::from_secs(45)).await;
        let first = limiter.remaining_tokens("alice", "10.0.0.1");
        let second = limiter.remaining_tokens("alice", "10.0.0.1");
        assert_eq!(first, second);
        assert_eq!(first.user_minute, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_exhaustion_across_identities() {
        let limiter = limiter(
            2,
            IdentityLimits::new(1, 60, 300),
            IdentityLimits::new(10, 200, 500),
        );

        assert!(limiter.check("u1", "10.0.0.1"));
        assert!(limiter.check("u2", "10.0.0.2"));

        let decision = limiter.check_detailed("u3", "10.0.0.3");
        assert!(!decision.allowed);
        assert_eq!(decision.exhausted, Some(Tier::Global));

        // u3's own buckets were created but not charged.
        let remaining = limiter.remaining_tokens("u3", "10.0.0.3");
        assert_eq!(remaining.user_minute, 1);
        assert_eq!(remaining.ip_minute, 10);
        assert_eq!(remaining.global, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_tier_shared_between_users() {
        let limiter = limiter(
            100,
            IdentityLimits::new(10, 60, 300),
            IdentityLimits::new(3, 200, 500),
        );

        for user in ["a", "b", "c"] {
            assert!(limiter.check(user, "10.0.0.1"));
        }
        let decision = limiter.check_detailed("d", "10.0.0.1");
        assert_eq!(decision.exhausted, Some(Tier::IpMinute));
        assert!(limiter.check("d", "10.0.0.2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_resets_identity() {
        let config = RateLimitConfig {
            max_tracked_identities: 2,
            ..RateLimitConfig::default()
        };
        let limiter = TieredRateLimiter::new(config);

        assert!(limiter.check("a", "ip-a"));
        assert!(limiter.check("a", "ip-a"));
        assert!(!limiter.check("a", "ip-a"));

        assert!(limiter.check("b", "ip-b"));
        assert!(limiter.check("c", "ip-c"));
        assert_eq!(limiter.tracked_users(), 2);
        assert_eq!(limiter.tracked_ips(), 2);

        // "a" was evicted and starts over.
        assert!(limiter.check("a", "ip-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_idle() {
        let limiter = TieredRateLimiter::with_defaults();
        limiter.check("old", "10.0.0.1");

        tokio::time::advance(Duration::from_secs(600)).await;
        limiter.check("new", "10.0.0.2");

        let removed = limiter.purge_idle(Duration::from_secs(300));
        assert_eq!(removed, 2);
        assert_eq!(limiter.tracked_users(), 1);
        assert_eq!(limiter.tracked_ips(), 1);
        assert_eq!(limiter.purge_idle(Duration::from_secs(300)), 0);
    }

    #[test]
    fn test_concurrent_checks_never_overspend_global() {
        let config = RateLimitConfig::new()
            .with_global(50, Duration::from_secs(86_400))
            .with_user_limits(IdentityLimits::new(1000, 1000, 1000))
            .with_ip_limits(IdentityLimits::new(1000, 1000, 1000));
        let limiter = Arc::new(TieredRateLimiter::new(config));

        let allowed: u64 = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let limiter = Arc::clone(&limiter);
                    scope.spawn(move || {
                        (0..25)
                            .filter(|i| limiter.check(&format!("user-{t}-{i}"), "10.0.0.1"))
                            .count() as u64
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, 50);
        assert_eq!(limiter.total_allowed(), 50);
        assert_eq!(limiter.total_denied(), 150);

        // The shared address bucket was charged exactly once per admission.
        let remaining = limiter.remaining_tokens("nobody", "10.0.0.1");
        assert_eq!(remaining.ip_day, 950);
    }
}
