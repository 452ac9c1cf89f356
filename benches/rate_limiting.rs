//! Benchmarks for the rate limiting module.
//!
//! Covers: token bucket arithmetic, single-key limiter acquire, and the
//! seven-tier check across a growing set of identities.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use quota_gate::modules::rate_limiting::{
    IdentityLimits, RateLimitConfig, RateLimiter, TieredRateLimiter, TokenBucket,
};
use std::hint::black_box;
use std::time::Duration;

// ---------------------------------------------------------------------------
// TokenBucket
// ---------------------------------------------------------------------------

fn bench_token_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiting/token_bucket");

    group.bench_function("try_consume_single", |b| {
        let mut bucket = TokenBucket::with_rate(1_000_000, 100_000.0);
        b.iter(|| {
            black_box(bucket.try_consume(1));
        });
    });

    group.bench_function("available_tokens", |b| {
        let mut bucket = TokenBucket::for_window(10_000, Duration::from_secs(60));
        b.iter(|| {
            black_box(bucket.available_tokens());
        });
    });

    group.bench_function("time_until_available", |b| {
        let mut bucket = TokenBucket::for_window(100, Duration::from_secs(60));
        while bucket.try_consume(1) {}
        b.iter(|| {
            black_box(bucket.time_until_available(1));
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Single-key limiter
// ---------------------------------------------------------------------------

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiting/limiter");

    group.bench_function("acquire_same_key", |b| {
        let limiter = RateLimiter::new(RateLimitConfig {
            default_limit: 1_000_000_000,
            ..RateLimitConfig::default()
        });
        b.iter(|| {
            black_box(limiter.acquire("client", None, None, None));
        });
    });

    for keys in [10usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("acquire_spread", keys), &keys, |b, &keys| {
            let limiter = RateLimiter::with_defaults();
            let names: Vec<String> = (0..keys).map(|i| format!("client-{i}")).collect();
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % names.len();
                black_box(limiter.acquire(&names[i], Some("api"), None, None));
            });
        });
    }

    group.bench_function("denied", |b| {
        let limiter = RateLimiter::with_defaults();
        while limiter.acquire("hot", None, Some(1), None).0 {}
        b.iter(|| {
            black_box(limiter.acquire("hot", None, Some(1), None));
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Tiered limiter
// ---------------------------------------------------------------------------

fn tiered(max_tracked: usize) -> TieredRateLimiter {
    let mut config = RateLimitConfig {
        max_tracked_identities: max_tracked,
        ..RateLimitConfig::default()
    };
    config.global.limit = 1_000_000_000;
    config.user = IdentityLimits::new(1_000_000, 10_000_000, 100_000_000);
    config.ip = IdentityLimits::new(1_000_000, 10_000_000, 100_000_000);
    TieredRateLimiter::new(config)
}

fn bench_tiered(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiting/tiered");

    group.bench_function("check_single_identity", |b| {
        let limiter = tiered(10_000);
        b.iter(|| {
            black_box(limiter.check("alice", "10.0.0.1"));
        });
    });

    for identities in [100usize, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("check_with_eviction", identities),
            &identities,
            |b, &identities| {
                // Half the working set fits, so the LRU keeps evicting.
                let limiter = tiered(identities / 2);
                let users: Vec<String> = (0..identities).map(|i| format!("user-{i}")).collect();
                let mut i = 0;
                b.iter(|| {
                    i = (i + 1) % users.len();
                    black_box(limiter.check(&users[i], "10.0.0.1"));
                });
            },
        );
    }

    group.bench_function("remaining_tokens", |b| {
        let limiter = tiered(10_000);
        limiter.check("alice", "10.0.0.1");
        b.iter(|| {
            black_box(limiter.remaining_tokens("alice", "10.0.0.1"));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_token_bucket, bench_rate_limiter, bench_tiered);
criterion_main!(benches);
