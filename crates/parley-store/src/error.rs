//! Error types for the store layer.

/// Errors returned by a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The Redis client reported an error (connection refused, timeout,
    /// protocol error, ...).
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A key holds a value of a different kind than the command expects.
    #[error("key {0:?} holds a value of the wrong kind")]
    WrongType(String),

    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
