//! Core entity trait that all cached records must implement.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::hash::Hash;

/// Trait for records whose snapshots are cached under `"{prefix}::{key}"`.
///
/// The key is assigned by the record store on insert, so a freshly built record
/// has none: [`cache_key`](CacheEntity::cache_key) returns `None` until the first
/// successful insert and the same value forever after.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use shelf_cache::CacheEntity;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Author {
///     pub id: Option<i64>,
///     pub name: String,
/// }
///
/// impl CacheEntity for Author {
///     type Key = i64;
///
///     fn cache_key(&self) -> Option<Self::Key> {
///         self.id
///     }
///
///     fn cache_prefix() -> &'static str {
///         "author"
///     }
/// }
/// ```
pub trait CacheEntity: Send + Sync + Serialize + DeserializeOwned + Clone {
    /// Type of the record's identity.
    type Key: Display + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the record's identity, `None` before it was first persisted.
    fn cache_key(&self) -> Option<Self::Key>;

    /// Fixed namespace literal for this record type, e.g. `"book"`.
    fn cache_prefix() -> &'static str;

    /// Serialize the record into a versioned snapshot envelope.
    ///
    /// See `crate::serialization` for the format.
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize a snapshot, validating magic header and schema version.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCacheEntry`: Bad magic
    /// - `Error::VersionMismatch`: Schema version changed
    /// - `Error::DeserializationError`: Corrupted payload
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }

    /// Optional: Validate the record after it was loaded from the cache.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Records whose key the store generates from a numeric sequence on insert.
///
/// Implemented by entities that can be held in
/// [`InMemoryRecordStore`](crate::repository::InMemoryRecordStore).
pub trait AssignKey: CacheEntity<Key = i64> {
    /// Stamp the store-generated key onto the record.
    fn assign_key(&mut self, key: i64);
}
