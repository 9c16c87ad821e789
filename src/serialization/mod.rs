//! Encoding of everything that crosses the backend boundary.
//!
//! Two formats are used, each for one kind of payload:
//!
//! - **Entity snapshots** (`book::7`) are wrapped in a versioned envelope and encoded
//!   with Postcard. The envelope lets a reader reject entries written by another
//!   schema version instead of decoding garbage.
//! - **Auxiliary values** (scalar values, hash fields, list/set/sorted-set members)
//!   are encoded as JSON. Numbers stay plain decimal text, so a value written with
//!   `set_value(key, &5)` can later be moved with `increment` on the server.
//!
//! ```text
//! snapshot: ┌─────────────────┬─────────────────┬──────────────────────────┐
//!           │  MAGIC (4 bytes)│VERSION (u32)    │POSTCARD PAYLOAD (N bytes)│
//!           └─────────────────┴─────────────────┴──────────────────────────┘
//! value:    serde_json::to_vec(&v)
//! ```
//!
//! # Example
//!
//! ```rust
//! use shelf_cache::serialization::{deserialize_from_cache, serialize_for_cache};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Book {
//!     id: u64,
//!     title: String,
//! }
//!
//! # fn main() -> shelf_cache::Result<()> {
//! let book = Book { id: 1, title: "Go in Action".to_string() };
//! let bytes = serialize_for_cache(&book)?;
//! let back: Book = deserialize_from_cache(&bytes)?;
//! assert_eq!(book, back);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic header for entity snapshots: b"SHLF"
pub const CACHE_MAGIC: [u8; 4] = *b"SHLF";

/// Current snapshot schema version.
///
/// Increment when a cached entity type changes shape (fields added, removed,
/// reordered or retyped). Entries carrying another version are evicted and
/// reloaded from the record store on their next read.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around an entity snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be [`CACHE_MAGIC`]
    pub magic: [u8; 4],
    /// Schema version: must match [`CURRENT_SCHEMA_VERSION`]
    pub version: u32,
    /// The entity snapshot
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize an entity snapshot inside a versioned envelope.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        log::error!("Snapshot serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize an entity snapshot, validating magic and schema version.
///
/// # Errors
///
/// - `Error::DeserializationError`: the bytes are not a decodable envelope
/// - `Error::InvalidCacheEntry`: invalid magic header
/// - `Error::VersionMismatch`: snapshot written by another schema version
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        log::error!("Snapshot deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        log::warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC,
            envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        log::warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION,
            envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}

/// Encode an auxiliary value (scalar, hash field, collection member) as JSON.
///
/// Equal values always encode to equal bytes, which is what set and sorted-set
/// membership on the server compares.
///
/// # Errors
///
/// Returns `Error::SerializationError` if the value cannot be represented.
pub fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        log::error!("Value serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode an auxiliary value previously written by [`encode_value`].
///
/// # Errors
///
/// Returns `Error::DeserializationError` if the bytes are not valid JSON for `V`.
pub fn decode_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    serde_json::from_slice(bytes).map_err(|e| Error::DeserializationError(e.to_string()))
}

/// Encode every element of a slice with [`encode_value`].
pub fn encode_values<V: Serialize>(values: &[V]) -> Result<Vec<Vec<u8>>> {
    values.iter().map(|v| encode_value(v)).collect()
}

/// Decode every element with [`decode_value`], failing on the first bad one.
pub fn decode_values<V: DeserializeOwned>(raw: Vec<Vec<u8>>) -> Result<Vec<V>> {
    raw.iter().map(|bytes| decode_value(bytes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Snapshot {
        id: i64,
        title: String,
        price: Option<f64>,
    }

    fn sample() -> Snapshot {
        Snapshot {
            id: 7,
            title: "Go in Action".to_string(),
            price: Some(39.99),
        }
    }

    #[test]
    fn test_envelope_structure() {
        let bytes = serialize_for_cache(&sample()).unwrap();

        // postcard uses variable-length integers, so inspect the decoded envelope
        let envelope: CacheEnvelope<Snapshot> = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.magic, CACHE_MAGIC);
        assert_eq!(envelope.version, CURRENT_SCHEMA_VERSION);
        assert_eq!(envelope.payload, sample());
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut envelope = CacheEnvelope::new(sample());
        envelope.magic = *b"XXXX";
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match deserialize_from_cache::<Snapshot>(&bytes).unwrap_err() {
            Error::InvalidCacheEntry(_) => {}
            e => panic!("Expected InvalidCacheEntry, got {:?}", e),
        }
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut envelope = CacheEnvelope::new(sample());
        envelope.version = 999;
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match deserialize_from_cache::<Snapshot>(&bytes).unwrap_err() {
            Error::VersionMismatch { expected, found } => {
                assert_eq!(expected, CURRENT_SCHEMA_VERSION);
                assert_eq!(found, 999);
            }
            e => panic!("Expected VersionMismatch, got {:?}", e),
        }
    }

    #[test]
    fn test_truncated_snapshot_rejected() {
        let mut bytes = serialize_for_cache(&sample()).unwrap();
        bytes.truncate(bytes.len() / 2);

        match deserialize_from_cache::<Snapshot>(&bytes).unwrap_err() {
            Error::DeserializationError(_) => {}
            e => panic!("Expected DeserializationError, got {:?}", e),
        }
    }

    #[test]
    fn test_integer_values_stay_decimal_text() {
        // The server-side INCRBY parses the stored bytes as a decimal integer.
        assert_eq!(encode_value(&42i64).unwrap(), b"42".to_vec());
        assert_eq!(decode_value::<i64>(b"43").unwrap(), 43);
    }

    #[test]
    fn test_equal_values_encode_identically() {
        let a = encode_value(&sample()).unwrap();
        let b = encode_value(&sample().clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_value_type_mismatch() {
        let bytes = encode_value(&"not a number").unwrap();
        assert!(matches!(
            decode_value::<i64>(&bytes),
            Err(Error::DeserializationError(_))
        ));
    }

    #[test]
    fn test_decode_values_batch() {
        let raw = encode_values(&["a", "b"]).unwrap();
        let back: Vec<String> = decode_values(raw).unwrap();
        assert_eq!(back, vec!["a".to_string(), "b".to_string()]);
    }
}
