//! Cache backend implementations.
//!
//! A backend speaks bytes and a Redis-shaped command set: plain values, hashes,
//! lists, sets and sorted sets, each key independently expirable. Typed access,
//! TTL-seconds conventions and argument checks live one level up in
//! [`CacheClient`](crate::client::CacheClient).

use crate::error::Result;
use std::collections::HashMap;
use std::time::Duration;

pub mod glob;
pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Longest lifetime a backend applies to a key; longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Remaining lifetime of a key as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (or already expired).
    Absent,
    /// Key exists and never expires.
    Persistent,
    /// Key exists and expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Decode the integer reply of Redis `TTL`/`PTTL` style commands
    /// (`-2` absent, `-1` no expiry, otherwise remaining time).
    pub fn from_reply(reply: i64, unit: Duration) -> Self {
        match reply {
            -2 => KeyTtl::Absent,
            r if r < 0 => KeyTtl::Persistent,
            r => {
                let nanos = unit.as_nanos().saturating_mul(u128::from(r.unsigned_abs()));
                KeyTtl::Expires(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
            }
        }
    }
}

/// Trait for cache backend implementations.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or external storage.
///
/// Every method is one remote round-trip; nothing is buffered locally.
///
/// # Errors
///
/// Methods return `Error::BackendError` when the backend is unreachable, and also when
/// a command targets a key holding another value shape (message starts with `WRONGTYPE`).
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    // ---- keys ----------------------------------------------------------------

    /// Retrieve a plain value. `Ok(None)` on miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a plain value, replacing whatever the key held.
    ///
    /// `ttl: None` stores without expiry and clears any previous TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key of any shape. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if key exists in cache.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Set a key's time-to-live, clamped to [`MAX_TTL`]. Returns false when the key
    /// does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Report a key's remaining time-to-live.
    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// List keys matching a glob-style pattern (see [`glob::matches`]).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Bulk delete operation. Returns the number of keys that existed.
    ///
    /// Default implementation calls `delete()` for each key.
    /// Override for batch efficiency (e.g., Redis DEL).
    async fn mdelete(&self, keys: &[&str]) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Add `delta` (which may be negative) to the integer stored at `key`.
    /// An absent key counts as 0. Returns the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    // ---- hashes --------------------------------------------------------------

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> Result<()>;

    async fn hset_all(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>>;

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>>;

    /// Returns the number of fields removed.
    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64>;

    async fn hexists(&self, key: &str, field: &str) -> Result<bool>;

    // ---- lists ---------------------------------------------------------------

    /// Append to the tail. Returns the list length after the push.
    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<u64>;

    /// Element at `index`; negative indices count from the tail (`-1` = last).
    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>>;

    /// Inclusive range with Redis index semantics (`0, -1` = whole list).
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>>;

    /// Remove every element equal to `value`. Returns the number removed.
    async fn lrem(&self, key: &str, value: Vec<u8>) -> Result<u64>;

    async fn llen(&self, key: &str) -> Result<u64>;

    // ---- sets ----------------------------------------------------------------

    /// Returns the number of members that were not already present.
    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64>;

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>>;

    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64>;

    async fn sismember(&self, key: &str, member: Vec<u8>) -> Result<bool>;

    async fn scard(&self, key: &str) -> Result<u64>;

    // ---- sorted sets ---------------------------------------------------------

    /// Insert or re-score a member. Returns true when the member is new.
    async fn zadd(&self, key: &str, member: Vec<u8>, score: f64) -> Result<bool>;

    /// Members with `min <= score <= max`, ascending by score.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Vec<u8>>>;

    async fn zrem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64>;

    async fn zcard(&self, key: &str) -> Result<u64>;

    // ---- administration ------------------------------------------------------

    /// Health check - verify backend is accessible.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Clear every key (use with caution).
    async fn clear_all(&self) -> Result<()>;
}
