//! Deterministic cache keys.

use super::error::CacheResult;
use serde::Serialize;
use std::fmt;

/// Cache key built from an operation name and its arguments.
///
/// Arguments are rendered as JSON with object keys sorted, so two maps with
/// the same entries produce the same key whatever their insertion order.
/// Sequence order is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key `operation:<canonical json of args>`.
    ///
    /// # Errors
    ///
    /// Fails if `args` cannot be represented as JSON (e.g. a map with
    /// non-string keys).
    pub fn new<A: Serialize + ?Sized>(operation: &str, args: &A) -> CacheResult<Self> {
        // `serde_json::Value` objects are ordered maps.
        let canonical = serde_json::to_value(args)?;
        Ok(Self(format!("{operation}:{canonical}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}
