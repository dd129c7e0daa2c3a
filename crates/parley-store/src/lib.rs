//! Key-value store abstraction for Parley.
//!
//! Credentials, session tokens, and the active-user set live outside the
//! server process, in a Redis-compatible store. The [`KeyValueStore`] trait
//! names the handful of commands the server needs; backends implement it:
//!
//! - [`RedisStore`] (feature `redis`, default): a real Redis server through
//!   an auto-reconnecting connection manager
//! - [`MemoryStore`]: an in-process map with TTL support, for tests and
//!   local runs
//!
//! All futures are `Send` so the store can be called from any connection
//! task on Tokio's multi-threaded runtime.

mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::future::Future;
use std::time::Duration;

/// The subset of Redis semantics Parley relies on.
///
/// Keys are untyped strings shared across value kinds (plain strings,
/// hashes, sets), as in Redis. Using a key as the wrong kind is a
/// [`StoreError::WrongType`].
pub trait KeyValueStore: Send + Sync + 'static {
    /// Checks that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads a string value. Expired keys read as `None`.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Writes a string value that expires after `ttl`, replacing any
    /// previous value and expiry.
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a key of any kind. Returns `true` if it existed.
    fn del(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Reads one field of a hash.
    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Writes one field of a hash, creating the hash if needed.
    fn hset(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds a member to a set. Returns `true` if it was not already present.
    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes a member from a set. Returns `true` if it was present.
    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Lists the members of a set, in no particular order.
    fn smembers(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}
