//! Error types for the cache-aside layer.

use std::fmt;

/// Result type for cache and store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the cache client, the record store and both caching strategies.
///
/// Failures coming from the two external collaborators (cache backend, record
/// store) are propagated unchanged. A read of an absent id is never an error: it is
/// reported as `Ok(None)`.
#[derive(Debug, Clone)]
pub enum Error {
    /// Encoding a value or entity snapshot for the cache failed.
    SerializationError(String),

    /// Bytes read from the cache could not be decoded into the requested type.
    ///
    /// Common causes:
    /// - The key was written by another writer with a different value type
    /// - The payload was truncated or corrupted
    DeserializationError(String),

    /// An entity or operation argument failed a consistency check.
    ///
    /// Raised for example when `update` is called on a record that has no id yet,
    /// or when the record store returns an inserted record without one.
    ValidationError(String),

    /// A caller passed an argument the operation never accepts.
    ///
    /// Checked before any remote call is made (for example a negative
    /// increment/decrement delta). Signals a programming error.
    InvalidArgument(String),

    /// A write targeted a record the store does not hold.
    NotFound(String),

    /// Cache backend failure (connection refused, pool exhausted, protocol or
    /// type error reported by the server).
    ///
    /// **Recovery:** not retried by this crate; retry policy belongs to the caller.
    BackendError(String),

    /// Record store failure (constraint violation, connectivity loss).
    RepositoryError(String),

    /// Invalid configuration while constructing a backend.
    ConfigError(String),

    /// A cached entity snapshot carries the wrong magic header.
    ///
    /// **Recovery:** the orchestrators evict the entry and reload from the store.
    InvalidCacheEntry(String),

    /// A cached entity snapshot was written with another schema version.
    ///
    /// **Recovery:** the orchestrators evict the entry and reload from the store.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// True when the failure came from an unreachable or failing collaborator
    /// (cache backend or record store) rather than from the caller's input.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::BackendError(_) | Error::RepositoryError(_))
    }

    /// True when the error means a cached snapshot is unreadable and should be
    /// replaced from the source of truth.
    pub fn is_stale_entry(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::InvalidCacheEntry(msg) => {
                write!(f, "Invalid cache entry: {}", msg)
            }
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidArgument("delta must not be negative".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid argument: delta must not be negative"
        );

        let err = Error::VersionMismatch {
            expected: 1,
            found: 7,
        };
        assert_eq!(err.to_string(), "Cache version mismatch: expected 1, found 7");
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(Error::BackendError("refused".into()).is_connectivity());
        assert!(Error::RepositoryError("gone".into()).is_connectivity());
        assert!(!Error::InvalidArgument("neg".into()).is_connectivity());
        assert!(!Error::NotFound("book::1".into()).is_connectivity());
    }

    #[test]
    fn test_stale_entry_classification() {
        assert!(Error::InvalidCacheEntry("magic".into()).is_stale_entry());
        assert!(Error::VersionMismatch {
            expected: 1,
            found: 2
        }
        .is_stale_entry());
        assert!(!Error::BackendError("refused".into()).is_stale_entry());
    }

    #[test]
    fn test_json_syntax_error_maps_to_deserialization() {
        let err: Error = serde_json::from_slice::<i64>(b"{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::DeserializationError(_)));
    }
}
