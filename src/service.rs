//! The four-verb surface a request layer consumes.
//!
//! Both caching strategies implement [`EntityService`], so a handler can be written
//! once and wired to either:
//!
//! ```ignore
//! async fn show<S: EntityService<Book>>(books: &S, id: i64) -> Result<Option<Book>> {
//!     books.read(&id).await
//! }
//! ```

use crate::entity::CacheEntity;
use crate::error::Result;

/// Create, read, update and delete one entity type through its cache.
#[allow(async_fn_in_trait)]
pub trait EntityService<T: CacheEntity>: Send + Sync {
    /// Persist a new record; the result carries the assigned key.
    async fn create(&self, record: &T) -> Result<T>;

    /// `Ok(None)` when no record has this key.
    async fn read(&self, id: &T::Key) -> Result<Option<T>>;

    /// Persist changes to an existing record.
    ///
    /// # Errors
    /// `Error::ValidationError` when the record has no key, `Error::NotFound` when
    /// the store holds no record with it.
    async fn update(&self, record: &T) -> Result<T>;

    /// Remove a record. Deleting an absent key succeeds.
    async fn delete(&self, id: &T::Key) -> Result<()>;
}
