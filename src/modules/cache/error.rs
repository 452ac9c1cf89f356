//! Cache error types.

use thiserror::Error;

/// Errors that can occur in the response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Arguments could not be turned into a cache key.
    #[error("failed to serialize cache key arguments: {0}")]
    KeySerialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
