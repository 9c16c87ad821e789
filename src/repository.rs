//! Record store trait for abstracting the source of truth.
//!
//! The `RecordStore` trait decouples the caching strategies from a specific
//! persistence layer. Implement it over SQLx, tokio-postgres, Diesel or any other
//! client; [`InMemoryRecordStore`] is provided for tests and demos.
//!
//! # Error Handling
//!
//! Return `Err` (usually `Error::RepositoryError`) for:
//! - Connectivity loss
//! - Constraint violations
//! - Query timeouts
//!
//! A missing row is not an error: `find_by_id` answers `Ok(None)` and the write
//! operations report an affected count of 0.

use crate::entity::{AssignKey, CacheEntity};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Trait for record store implementations.
#[allow(async_fn_in_trait)]
pub trait RecordStore<T: CacheEntity>: Send + Sync {
    /// Persist a new record and return it with its assigned key.
    ///
    /// # Errors
    /// Returns `Err` on constraint violation or when the store is unavailable.
    async fn insert(&self, record: &T) -> Result<T>;

    /// Fetch a record by key.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Record found
    /// - `Ok(None)` - Record not found (not an error)
    /// - `Err(e)` - Store error
    async fn find_by_id(&self, id: &T::Key) -> Result<Option<T>>;

    /// Replace the stored record with the same key. Returns the affected row count.
    async fn update(&self, record: &T) -> Result<u64>;

    /// Remove a record. Returns the affected row count.
    async fn delete_by_id(&self, id: &T::Key) -> Result<u64>;
}

// ============================================================================
// In-Memory Record Store
// ============================================================================

/// Number of calls each store operation received.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub inserts: u64,
    pub finds: u64,
    pub updates: u64,
    pub deletes: u64,
}

#[derive(Default)]
struct CallCounters {
    inserts: AtomicU64,
    finds: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

/// Thread-safe in-memory record store with a numeric key sequence.
///
/// Counts every call it receives, which is how tests observe whether a read was
/// answered from the cache.
///
/// ```
/// use shelf_cache::repository::{InMemoryRecordStore, RecordStore};
/// use shelf_cache::Book;
///
/// # #[tokio::main]
/// # async fn main() -> shelf_cache::Result<()> {
/// let store = InMemoryRecordStore::<Book>::starting_at(7);
/// let saved = store.insert(&Book::new("Go in Action", "W. Kennedy")).await?;
/// assert_eq!(saved.id, Some(7));
/// assert_eq!(store.calls().inserts, 1);
/// # Ok(())
/// # }
/// ```
pub struct InMemoryRecordStore<T: AssignKey> {
    rows: DashMap<i64, T>,
    next_id: AtomicI64,
    calls: CallCounters,
}

impl<T: AssignKey> InMemoryRecordStore<T> {
    /// Create an empty store whose first assigned key is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create an empty store whose first assigned key is `first_id`.
    pub fn starting_at(first_id: i64) -> Self {
        InMemoryRecordStore {
            rows: DashMap::new(),
            next_id: AtomicI64::new(first_id),
            calls: CallCounters::default(),
        }
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            inserts: self.calls.inserts.load(Ordering::SeqCst),
            finds: self.calls.finds.load(Ordering::SeqCst),
            updates: self.calls.updates.load(Ordering::SeqCst),
            deletes: self.calls.deletes.load(Ordering::SeqCst),
        }
    }

    /// Return the number of stored records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove all records. Counters and the key sequence are kept.
    pub fn clear(&self) {
        self.rows.clear();
    }
}

impl<T: AssignKey> Default for InMemoryRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AssignKey> RecordStore<T> for InMemoryRecordStore<T> {
    async fn insert(&self, record: &T) -> Result<T> {
        self.calls.inserts.fetch_add(1, Ordering::SeqCst);

        let mut row = record.clone();
        let id = match record.cache_key() {
            Some(id) => {
                // Keep the sequence ahead of explicitly keyed rows.
                self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
                id
            }
            None => {
                let id = self
                    .next_id
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
                    .map_err(|_| {
                        Error::RepositoryError(format!(
                            "key sequence for {} is exhausted",
                            T::cache_prefix()
                        ))
                    })?;
                row.assign_key(id);
                id
            }
        };

        match self.rows.entry(id) {
            Entry::Occupied(_) => Err(Error::RepositoryError(format!(
                "duplicate key {} for {}",
                id,
                T::cache_prefix()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                debug!("✓ Store INSERT {}::{}", T::cache_prefix(), id);
                Ok(row)
            }
        }
    }

    async fn find_by_id(&self, id: &T::Key) -> Result<Option<T>> {
        self.calls.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.get(id).map(|row| row.value().clone()))
    }

    async fn update(&self, record: &T) -> Result<u64> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);

        let Some(id) = record.cache_key() else {
            return Ok(0);
        };
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                *row = record.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_by_id(&self, id: &T::Key) -> Result<u64> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(u64::from(self.rows.remove(id).is_some()))
    }
}
