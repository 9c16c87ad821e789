//! Typed cache client over a [`CacheBackend`].
//!
//! The client owns the conventions callers rely on:
//!
//! - TTLs are whole seconds. `None` or a non-positive value means "no expiry".
//!   Backends clamp longer TTLs to [`MAX_TTL`](crate::backend::MAX_TTL).
//! - [`get_ttl`](CacheClient::get_ttl) answers `0` for a key without expiry and
//!   [`TTL_ABSENT`] for a missing key.
//! - Arguments are validated before anything is sent to the backend.
//! - Values cross the boundary as JSON, entity snapshots as versioned envelopes.
//!
//! Sub-structure writes given a TTL are two round-trips (write, then expire), so
//! a concurrent reader may briefly observe the new data without its TTL.

use crate::backend::{CacheBackend, KeyTtl};
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::serialization::{decode_value, decode_values, encode_value, encode_values};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// [`CacheClient::get_ttl`] reply for a key that does not exist.
pub const TTL_ABSENT: i64 = -2;

/// Positive TTL seconds as a duration, `None` for "no expiry".
fn ttl_from_secs(ttl_secs: Option<i64>) -> Option<Duration> {
    ttl_secs
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs.unsigned_abs()))
}

/// Whole seconds left, rounded up so a live key never reports 0.
fn remaining_secs(left: Duration) -> i64 {
    let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    i64::try_from(secs.max(1)).unwrap_or(i64::MAX)
}

fn check_delta(delta: i64) -> Result<()> {
    if delta < 0 {
        return Err(Error::InvalidArgument(format!(
            "delta must be non-negative, got {}",
            delta
        )));
    }
    Ok(())
}

/// Typed facade over a byte-level backend.
///
/// Cloning is cheap: backends share their pool or map.
///
/// # Example
///
/// ```
/// use shelf_cache::{CacheClient, InMemoryBackend};
///
/// # #[tokio::main]
/// # async fn main() -> shelf_cache::Result<()> {
/// let client = CacheClient::new(InMemoryBackend::new());
///
/// client.set_value("visits", &5, None).await?;
/// assert_eq!(client.increment("visits", 2).await?, 7);
///
/// client.list_append("recent", &"book::7", Some(300)).await?;
/// assert!(client.get_ttl("recent").await? > 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheClient<B: CacheBackend> {
    backend: B,
}

impl<B: CacheBackend> CacheClient<B> {
    pub fn new(backend: B) -> Self {
        CacheClient { backend }
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn apply_ttl(&self, key: &str, ttl_secs: Option<i64>) -> Result<()> {
        if let Some(ttl) = ttl_from_secs(ttl_secs) {
            self.backend.expire(key, ttl).await?;
        }
        Ok(())
    }

    // ---- keys ----------------------------------------------------------------

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }

    /// Give `key` a lifetime of `ttl_secs` seconds.
    ///
    /// Returns false without contacting the backend when `ttl_secs <= 0`, and false
    /// when the key does not exist.
    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<bool> {
        match ttl_from_secs(Some(ttl_secs)) {
            Some(ttl) => self.backend.expire(key, ttl).await,
            None => {
                debug!("✓ EXPIRE {} skipped (ttl {}s)", key, ttl_secs);
                Ok(false)
            }
        }
    }

    /// Remaining lifetime in seconds, rounded up.
    ///
    /// `0` means the key exists without expiry, [`TTL_ABSENT`] that it does not exist.
    pub async fn get_ttl(&self, key: &str) -> Result<i64> {
        Ok(match self.backend.ttl(key).await? {
            KeyTtl::Absent => TTL_ABSENT,
            KeyTtl::Persistent => 0,
            KeyTtl::Expires(left) => remaining_secs(left),
        })
    }

    /// Remove a key of any shape. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.backend.delete(key).await
    }

    /// Delete each key independently.
    ///
    /// Every key is attempted even if some fail; the first failure is returned
    /// afterwards. Returns the number of keys that existed.
    pub async fn delete_many(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let outcomes =
            futures::future::join_all(keys.iter().map(|key| self.backend.delete(key))).await;

        let mut removed = 0;
        let mut first_error = None;
        for (key, outcome) in keys.iter().zip(outcomes) {
            match outcome {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("⚠ DELETE {} failed during bulk delete: {}", key, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Delete every key matching a glob-style pattern. Returns the number deleted.
    pub async fn delete_by_pattern(&self, pattern: &str) -> Result<u64> {
        let keys = self.backend.keys(pattern).await?;
        if keys.is_empty() {
            debug!("✓ DELETE pattern {} matched nothing", pattern);
            return Ok(0);
        }

        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let removed = self.backend.mdelete(&refs).await?;
        debug!("✓ DELETE pattern {} -> {} keys", pattern, removed);
        Ok(removed)
    }

    // ---- scalars -------------------------------------------------------------

    /// Store `value`, replacing whatever `key` held and any previous TTL.
    pub async fn set_value<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl_secs: Option<i64>,
    ) -> Result<()> {
        let bytes = encode_value(value)?;
        self.backend.set(key, bytes, ttl_from_secs(ttl_secs)).await
    }

    pub async fn get_value<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        match self.backend.get(key).await? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Add `delta` to the integer at `key` (absent counts as 0).
    ///
    /// # Errors
    /// `Error::InvalidArgument` when `delta` is negative; the backend is not contacted.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        check_delta(delta)?;
        self.backend.incr_by(key, delta).await
    }

    /// Subtract `delta` from the integer at `key` (absent counts as 0).
    ///
    /// # Errors
    /// `Error::InvalidArgument` when `delta` is negative; the backend is not contacted.
    pub async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        check_delta(delta)?;
        self.backend.incr_by(key, -delta).await
    }

    // ---- entity snapshots ----------------------------------------------------

    /// Read and validate an entity snapshot.
    pub async fn get_entity<T: CacheEntity>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => {
                let entity = T::deserialize_from_cache(&bytes)?;
                entity.validate()?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Like [`get_entity`](Self::get_entity), but an unreadable snapshot (bad magic,
    /// other schema version, corrupt payload, failed validation) is deleted and
    /// reported as a miss.
    pub async fn get_entity_or_evict<T: CacheEntity>(&self, key: &str) -> Result<Option<T>> {
        match self.get_entity::<T>(key).await {
            Err(e) if e.is_stale_entry() || matches!(e, Error::ValidationError(_)) => {
                warn!("⚠ Evicting unreadable cache entry {}: {}", key, e);
                self.backend.delete(key).await?;
                Ok(None)
            }
            other => other,
        }
    }

    /// Write an entity snapshot, `ttl: None` for no expiry.
    pub async fn set_entity<T: CacheEntity>(
        &self,
        key: &str,
        entity: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = entity.serialize_for_cache().map_err(|e| {
            error!("✗ Failed to serialize snapshot for {}: {}", key, e);
            e
        })?;
        self.backend.set(key, bytes, ttl).await
    }

    // ---- hashes --------------------------------------------------------------

    pub async fn hash_set<V: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &V,
        ttl_secs: Option<i64>,
    ) -> Result<()> {
        let bytes = encode_value(value)?;
        self.backend.hset(key, field, bytes).await?;
        self.apply_ttl(key, ttl_secs).await
    }

    /// Write several fields at once. An empty map is a no-op.
    pub async fn hash_set_all<V: Serialize>(
        &self,
        key: &str,
        fields: &HashMap<String, V>,
        ttl_secs: Option<i64>,
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let encoded = fields
            .iter()
            .map(|(field, value)| Ok((field.clone(), encode_value(value)?)))
            .collect::<Result<Vec<_>>>()?;
        self.backend.hset_all(key, encoded).await?;
        self.apply_ttl(key, ttl_secs).await
    }

    pub async fn hash_get<V: DeserializeOwned>(&self, key: &str, field: &str) -> Result<Option<V>> {
        match self.backend.hget(key, field).await? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub async fn hash_get_all<V: DeserializeOwned>(&self, key: &str) -> Result<HashMap<String, V>> {
        self.backend
            .hget_all(key)
            .await?
            .into_iter()
            .map(|(field, bytes)| Ok((field, decode_value(&bytes)?)))
            .collect()
    }

    /// Returns the number of fields removed.
    pub async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.backend.hdel(key, fields).await
    }

    pub async fn hash_exists(&self, key: &str, field: &str) -> Result<bool> {
        self.backend.hexists(key, field).await
    }

    // ---- lists ---------------------------------------------------------------

    /// Append to the tail. Returns the new length.
    pub async fn list_append<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl_secs: Option<i64>,
    ) -> Result<u64> {
        let len = self.backend.rpush(key, vec![encode_value(value)?]).await?;
        self.apply_ttl(key, ttl_secs).await?;
        Ok(len)
    }

    /// Append every value in order. Returns the new length, or 0 for no values.
    pub async fn list_append_all<V: Serialize>(
        &self,
        key: &str,
        values: &[V],
        ttl_secs: Option<i64>,
    ) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let len = self.backend.rpush(key, encode_values(values)?).await?;
        self.apply_ttl(key, ttl_secs).await?;
        Ok(len)
    }

    /// Element at `index`; negative indices count from the tail.
    pub async fn list_get_at<V: DeserializeOwned>(
        &self,
        key: &str,
        index: i64,
    ) -> Result<Option<V>> {
        match self.backend.lindex(key, index).await? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Inclusive range; `(0, -1)` is the whole list.
    pub async fn list_range<V: DeserializeOwned>(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<V>> {
        decode_values(self.backend.lrange(key, start, end).await?)
    }

    /// Remove every occurrence of `value`. Returns the number removed.
    pub async fn list_remove_value<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
    ) -> Result<u64> {
        self.backend.lrem(key, encode_value(value)?).await
    }

    pub async fn list_size(&self, key: &str) -> Result<u64> {
        self.backend.llen(key).await
    }

    // ---- sets ----------------------------------------------------------------

    /// Returns the number of members that were not already present.
    pub async fn set_add<V: Serialize>(
        &self,
        key: &str,
        members: &[V],
        ttl_secs: Option<i64>,
    ) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let added = self.backend.sadd(key, encode_values(members)?).await?;
        self.apply_ttl(key, ttl_secs).await?;
        Ok(added)
    }

    pub async fn set_members<V: DeserializeOwned>(&self, key: &str) -> Result<Vec<V>> {
        decode_values(self.backend.smembers(key).await?)
    }

    pub async fn set_remove<V: Serialize>(&self, key: &str, members: &[V]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.backend.srem(key, encode_values(members)?).await
    }

    pub async fn set_contains<V: Serialize + ?Sized>(&self, key: &str, member: &V) -> Result<bool> {
        self.backend.sismember(key, encode_value(member)?).await
    }

    pub async fn set_size(&self, key: &str) -> Result<u64> {
        self.backend.scard(key).await
    }

    // ---- sorted sets ---------------------------------------------------------

    /// Insert `member` or update its score. Returns true when the member is new.
    pub async fn z_add<V: Serialize + ?Sized>(
        &self,
        key: &str,
        member: &V,
        score: f64,
    ) -> Result<bool> {
        self.backend.zadd(key, encode_value(member)?, score).await
    }

    /// Members with `min <= score <= max`, lowest score first.
    pub async fn z_range_by_score<V: DeserializeOwned>(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<V>> {
        decode_values(self.backend.zrange_by_score(key, min, max).await?)
    }

    pub async fn z_remove<V: Serialize>(&self, key: &str, members: &[V]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.backend.zrem(key, encode_values(members)?).await
    }

    pub async fn z_size(&self, key: &str) -> Result<u64> {
        self.backend.zcard(key).await
    }

    // ---- administration ------------------------------------------------------

    pub async fn health_check(&self) -> Result<bool> {
        self.backend.health_check().await
    }
}
