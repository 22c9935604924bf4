//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
///
/// Backend errors pass through unchanged; only unsupported configuration is
/// converted into [`CacheError::Config`] by the adapter factory, before any
/// adapter is constructed.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Filesystem I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid or unsupported store configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("Cache error: {0}")]
    Other(String),
}
