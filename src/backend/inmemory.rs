//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Mirrors Redis semantics for every value shape so the typed client behaves the
//! same against either backend: TTL expiration on access, `WRONGTYPE` errors on
//! shape clashes, and empty collections disappearing.

use super::{glob, CacheBackend, KeyTtl, MAX_TTL};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Value shapes a key can hold.
enum Value {
    Bytes(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    List(Vec<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    Sorted(HashMap<Vec<u8>, f64>),
}

impl Value {
    fn is_empty_collection(&self) -> bool {
        match self {
            Value::Bytes(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Sorted(z) => z.is_empty(),
        }
    }

    fn byte_size(&self) -> usize {
        match self {
            Value::Bytes(b) => b.len(),
            Value::Hash(h) => h.iter().map(|(f, v)| f.len() + v.len()).sum(),
            Value::List(l) => l.iter().map(Vec::len).sum(),
            Value::Set(s) => s.iter().map(Vec::len).sum(),
            Value::Sorted(z) => z.keys().map(|m| m.len() + 8).sum(),
        }
    }
}

fn wrong_type() -> Error {
    Error::BackendError(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

macro_rules! shape {
    ($value:expr, $variant:ident) => {
        match $value {
            Value::$variant(inner) => Ok(inner),
            _ => Err(wrong_type()),
        }
    };
}

/// In-memory cache entry with optional expiration.
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

/// Expiry instant for `ttl` from now, clamped to [`MAX_TTL`]. `None` (no expiry)
/// when the platform clock cannot represent it.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl.min(MAX_TTL))
}

impl CacheEntry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.and_then(deadline);
        CacheEntry { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Resolve a possibly negative list index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

/// Thread-safe async in-memory cache backend.
///
/// # Example
///
/// ```no_run
/// use shelf_cache::backend::{CacheBackend, InMemoryBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("book::1", b"snapshot".to_vec(), None).await?;
///     assert!(backend.get("book::1").await?.is_some());
///
///     backend.rpush("recent", vec![b"1".to_vec(), b"2".to_vec()]).await?;
///     backend.expire("recent", Duration::from_secs(300)).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Get the current number of keys (expired ones included until touched).
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get memory statistics.
    pub async fn stats(&self) -> CacheStats {
        let total_bytes: usize = self
            .store
            .iter()
            .map(|entry| entry.key().len() + entry.value.byte_size())
            .sum();
        let expired_count = self.store.iter().filter(|entry| entry.is_expired()).count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries: expired_count,
            total_bytes,
        }
    }

    /// Drop `key` if its TTL has passed. Must not be called while holding a
    /// reference into the same shard.
    fn purge_if_expired(&self, key: &str) {
        let expired = self.store.get(key).is_some_and(|entry| entry.is_expired());
        if expired {
            self.store.remove_if(key, |_, entry| entry.is_expired());
            debug!("✓ InMemory EXPIRED {}", key);
        }
    }

    /// Run `f` against a live key, `Ok(None)` when the key is absent.
    fn read<R>(&self, key: &str, f: impl FnOnce(&Value) -> Result<R>) -> Result<Option<R>> {
        self.purge_if_expired(key);
        match self.store.get(key) {
            Some(entry) => f(&entry.value).map(Some),
            None => Ok(None),
        }
    }

    /// Run `f` against the key's value, creating it with `init` when absent.
    fn write<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> Value,
        f: impl FnOnce(&mut Value) -> Result<R>,
    ) -> Result<R> {
        self.purge_if_expired(key);
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(init(), None));
        f(&mut entry.value)
    }

    /// Run `f` against an existing key, then drop the key if it became an empty
    /// collection. `Ok(None)` when the key is absent.
    fn modify<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> Result<R>) -> Result<Option<R>> {
        self.purge_if_expired(key);
        let result = match self.store.get_mut(key) {
            Some(mut entry) => f(&mut entry.value).map(Some),
            None => Ok(None),
        };
        self.store
            .remove_if(key, |_, entry| entry.value.is_empty_collection());
        result
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.read(key, |v| shape!(v, Bytes).map(Clone::clone))?;
        if value.is_some() {
            debug!("✓ InMemory GET {} -> HIT", key);
        } else {
            debug!("✓ InMemory GET {} -> MISS", key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(Value::Bytes(value), ttl);
        self.store.insert(key.to_string(), entry);

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.purge_if_expired(key);
        let existed = self.store.remove(key).is_some();
        debug!("✓ InMemory DELETE {} (existed: {})", key, existed);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if let Some(entry) = self.store.get(key) {
            return Ok(!entry.is_expired());
        }

        Ok(false)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.purge_if_expired(key);
        match self.store.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = deadline(ttl);
                debug!("✓ InMemory EXPIRE {} (TTL: {:?})", key, ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.purge_if_expired(key);
        Ok(match self.store.get(key) {
            None => KeyTtl::Absent,
            Some(entry) => match entry.expires_at {
                None => KeyTtl::Persistent,
                Some(at) => KeyTtl::Expires(at.saturating_duration_since(Instant::now())),
            },
        })
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| !entry.is_expired() && glob::matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        debug!("✓ InMemory KEYS {} -> {} keys", pattern, keys.len());
        Ok(keys)
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            self.purge_if_expired(key);
            if self.store.remove(*key).is_some() {
                removed += 1;
            }
        }

        debug!("✓ InMemory MDELETE {} keys ({} existed)", keys.len(), removed);
        Ok(removed)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let next = self.write(
            key,
            || Value::Bytes(b"0".to_vec()),
            |v| {
                let bytes = shape!(v, Bytes)?;
                let current = std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .ok_or_else(|| {
                        Error::BackendError(
                            "ERR value is not an integer or out of range".to_string(),
                        )
                    })?;
                let next = current.checked_add(delta).ok_or_else(|| {
                    Error::BackendError("ERR increment or decrement would overflow".to_string())
                })?;
                *bytes = next.to_string().into_bytes();
                Ok(next)
            },
        )?;
        debug!("✓ InMemory INCRBY {} {} -> {}", key, delta, next);
        Ok(next)
    }

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> Result<()> {
        self.write(
            key,
            || Value::Hash(HashMap::new()),
            |v| {
                shape!(v, Hash)?.insert(field.to_string(), value);
                Ok(())
            },
        )?;
        debug!("✓ InMemory HSET {} {}", key, field);
        Ok(())
    }

    async fn hset_all(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let count = fields.len();
        self.write(
            key,
            || Value::Hash(HashMap::new()),
            |v| {
                shape!(v, Hash)?.extend(fields);
                Ok(())
            },
        )?;
        debug!("✓ InMemory HSET {} ({} fields)", key, count);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(key, |v| Ok(shape!(v, Hash)?.get(field).cloned()))?
            .flatten())
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        Ok(self
            .read(key, |v| shape!(v, Hash).map(Clone::clone))?
            .unwrap_or_default())
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64> {
        let removed = self.modify(key, |v| {
            let hash = shape!(v, Hash)?;
            Ok(fields.iter().filter(|f| hash.remove(**f).is_some()).count() as u64)
        })?;
        Ok(removed.unwrap_or(0))
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        Ok(self
            .read(key, |v| Ok(shape!(v, Hash)?.contains_key(field)))?
            .unwrap_or(false))
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<u64> {
        if values.is_empty() {
            return self.llen(key).await;
        }
        let len = self.write(
            key,
            || Value::List(Vec::new()),
            |v| {
                let list = shape!(v, List)?;
                list.extend(values);
                Ok(list.len() as u64)
            },
        )?;
        debug!("✓ InMemory RPUSH {} -> len {}", key, len);
        Ok(len)
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read(key, |v| {
                let list = shape!(v, List)?;
                Ok(resolve_index(index, list.len()).map(|i| list[i].clone()))
            })?
            .flatten())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .read(key, |v| {
                let list = shape!(v, List)?;
                let len = list.len() as i64;
                let start = if start < 0 { (start + len).max(0) } else { start };
                let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
                if start > stop || start >= len {
                    return Ok(Vec::new());
                }
                Ok(list[start as usize..=stop as usize].to_vec())
            })?
            .unwrap_or_default())
    }

    async fn lrem(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let removed = self.modify(key, |v| {
            let list = shape!(v, List)?;
            let before = list.len();
            list.retain(|item| *item != value);
            Ok((before - list.len()) as u64)
        })?;
        Ok(removed.unwrap_or(0))
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        Ok(self
            .read(key, |v| Ok(shape!(v, List)?.len() as u64))?
            .unwrap_or(0))
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.write(
            key,
            || Value::Set(BTreeSet::new()),
            |v| {
                let set = shape!(v, Set)?;
                Ok(members.into_iter().filter(|m| set.insert(m.clone())).count() as u64)
            },
        )
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .read(key, |v| Ok(shape!(v, Set)?.iter().cloned().collect()))?
            .unwrap_or_default())
    }

    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        let removed = self.modify(key, |v| {
            let set = shape!(v, Set)?;
            Ok(members.iter().filter(|m| set.remove(*m)).count() as u64)
        })?;
        Ok(removed.unwrap_or(0))
    }

    async fn sismember(&self, key: &str, member: Vec<u8>) -> Result<bool> {
        Ok(self
            .read(key, |v| Ok(shape!(v, Set)?.contains(&member)))?
            .unwrap_or(false))
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        Ok(self
            .read(key, |v| Ok(shape!(v, Set)?.len() as u64))?
            .unwrap_or(0))
    }

    async fn zadd(&self, key: &str, member: Vec<u8>, score: f64) -> Result<bool> {
        if score.is_nan() {
            return Err(Error::BackendError(
                "ERR value is not a valid float".to_string(),
            ));
        }
        let added = self.write(
            key,
            || Value::Sorted(HashMap::new()),
            |v| Ok(shape!(v, Sorted)?.insert(member, score).is_none()),
        )?;
        debug!("✓ InMemory ZADD {} (score {}, new: {})", key, score, added);
        Ok(added)
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .read(key, |v| {
                let mut hits: Vec<(&Vec<u8>, f64)> = shape!(v, Sorted)?
                    .iter()
                    .filter(|(_, score)| min <= **score && **score <= max)
                    .map(|(member, score)| (member, *score))
                    .collect();
                hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
                Ok(hits.into_iter().map(|(member, _)| member.clone()).collect())
            })?
            .unwrap_or_default())
    }

    async fn zrem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        let removed = self.modify(key, |v| {
            let zset = shape!(v, Sorted)?;
            Ok(members.iter().filter(|m| zset.remove(*m).is_some()).count() as u64)
        })?;
        Ok(removed.unwrap_or(0))
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        Ok(self
            .read(key, |v| Ok(shape!(v, Sorted)?.len() as u64))?
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<bool> {
        // In-memory backend is always healthy
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
