//! Cache key management utilities.
//!
//! Entity keys follow `"{prefix}::{id}"` (for example `book::7`). The separator is
//! part of the interoperability contract with monitoring tools reading the cache,
//! so it must not change.

use crate::entity::CacheEntity;
use std::fmt::Display;

/// Separator between the entity prefix and the id.
pub const KEY_SEPARATOR: &str = "::";

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build full cache key from entity type and ID.
    pub fn build<T: CacheEntity>(id: &T::Key) -> String {
        Self::build_with_prefix(T::cache_prefix(), id)
    }

    /// Build cache key with custom prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn Display) -> String {
        format!("{}{}{}", prefix, KEY_SEPARATOR, id)
    }

    /// Glob pattern matching every entity key of `T`, e.g. `book::*`.
    pub fn pattern<T: CacheEntity>() -> String {
        format!("{}{}*", T::cache_prefix(), KEY_SEPARATOR)
    }

    /// Build composite key from multiple parts, e.g. `book::7::tags`.
    pub fn build_composite(parts: &[&str]) -> String {
        parts.join(KEY_SEPARATOR)
    }

    /// Parse a composite key into parts.
    pub fn parse(key: &str) -> Vec<&str> {
        key.split(KEY_SEPARATOR).collect()
    }
}
