//! # Response Cache Module
//!
//! In-memory key/value cache with a TTL per entry, for memoizing idempotent
//! upstream calls.
//!
//! ```
//! use quota_gate::modules::cache::{CacheKey, ResponseCache};
//! use std::time::Duration;
//!
//! let cache = ResponseCache::new(Duration::from_secs(3600));
//! let key = CacheKey::new("quote", &("ACME", "1d")).unwrap();
//! cache.insert(key.as_str(), 42u32);
//! assert_eq!(cache.get(key.as_str()), Some(42));
//! ```

mod config;
mod error;
mod key;
mod store;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use store::ResponseCache;
