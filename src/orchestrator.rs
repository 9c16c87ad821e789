//! Cache-aside orchestration for one entity type.
//!
//! [`CacheAside`] keeps the snapshot under `<prefix>::<id>` consistent with the
//! record store:
//!
//! - **read**: cache first; on a miss, fetch from the store and populate. An absent
//!   record is answered with `None` and nothing is cached.
//! - **create**: persist first, then cache the stored record under its new key.
//! - **update**: persist first, then overwrite the cache entry. When the store
//!   reports no affected row the entry is evicted and `Error::NotFound` returned.
//! - **delete**: evict first, then delete from the store. A store failure is
//!   returned to the caller; the entry stays evicted.
//!
//! Errors from the backend or the store propagate unchanged. Nothing is retried.
//!
//! # Example
//!
//! ```
//! use shelf_cache::repository::InMemoryRecordStore;
//! use shelf_cache::{Book, CacheAside, CacheClient, InMemoryBackend};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> shelf_cache::Result<()> {
//! let books = CacheAside::new(
//!     CacheClient::new(InMemoryBackend::new()),
//!     Arc::new(InMemoryRecordStore::<Book>::starting_at(7)),
//! );
//!
//! let saved = books.create(&Book::new("Go in Action", "W. Kennedy")).await?;
//! assert_eq!(saved.id, Some(7));
//! assert_eq!(books.read(&7).await?, Some(saved));
//! # Ok(())
//! # }
//! ```

use crate::backend::CacheBackend;
use crate::client::CacheClient;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::repository::RecordStore;
use crate::service::EntityService;
use crate::strategy::CacheStrategy;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Explicit cache-aside orchestrator.
pub struct CacheAside<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    client: CacheClient<B>,
    store: Arc<R>,
    ttl_policy: TtlPolicy,
    metrics: Arc<dyn CacheMetrics>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, B, R> Clone for CacheAside<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    fn clone(&self) -> Self {
        CacheAside {
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            ttl_policy: self.ttl_policy.clone(),
            metrics: Arc::clone(&self.metrics),
            _entity: PhantomData,
        }
    }
}

impl<T, B, R> CacheAside<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    /// Create an orchestrator. Snapshots are cached without TTL until a policy is set.
    pub fn new(client: CacheClient<B>, store: Arc<R>) -> Self {
        CacheAside {
            client,
            store,
            ttl_policy: TtlPolicy::default(),
            metrics: Arc::new(NoOpMetrics),
            _entity: PhantomData,
        }
    }

    /// Set custom TTL policy.
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn client(&self) -> &CacheClient<B> {
        &self.client
    }

    pub fn store(&self) -> &Arc<R> {
        &self.store
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl_policy.get_ttl(T::cache_prefix())
    }

    /// Cache-first read with store fallback (`CacheStrategy::Refresh`).
    pub async fn read(&self, id: &T::Key) -> Result<Option<T>> {
        self.read_with(id, CacheStrategy::Refresh).await
    }

    /// Read with an explicit strategy.
    ///
    /// # Errors
    ///
    /// - `Error::BackendError`: cache backend unavailable
    /// - `Error::RepositoryError`: record store unavailable
    /// - `Error::SerializationError`: the fetched record could not be cached
    pub async fn read_with(&self, id: &T::Key, strategy: CacheStrategy) -> Result<Option<T>> {
        let key = CacheKeyBuilder::build::<T>(id);
        debug!("» Cache read for key: {} (strategy: {})", key, strategy);

        let result = self.read_inner(id, &key, strategy).await;
        if let Err(e) = &result {
            self.metrics.record_error(&key, &e.to_string());
        }
        result
    }

    async fn read_inner(&self, id: &T::Key, key: &str, strategy: CacheStrategy) -> Result<Option<T>> {
        if strategy == CacheStrategy::Invalidate {
            self.evict_key(key).await?;
        }

        if strategy.reads_cache() {
            let timer = Instant::now();
            if let Some(hit) = self.client.get_entity_or_evict::<T>(key).await? {
                self.metrics.record_hit(key, timer.elapsed());
                return Ok(Some(hit));
            }
            self.metrics.record_miss(key, timer.elapsed());

            if !strategy.falls_back_to_store() {
                debug!("✗ Cache miss ({} strategy) - no fallback for {}", strategy, key);
                return Ok(None);
            }
        }

        match self.store.find_by_id(id).await? {
            Some(record) => {
                self.populate(key, &record).await?;
                Ok(Some(record))
            }
            None => {
                debug!("Record not found in store for {}; nothing cached", key);
                Ok(None)
            }
        }
    }

    /// Persist `record`, then cache the stored version under its assigned key.
    ///
    /// Nothing is cached when the insert fails.
    pub async fn create(&self, record: &T) -> Result<T> {
        let saved = self.store.insert(record).await?;
        let id = saved.cache_key().ok_or_else(|| {
            Error::ValidationError(format!(
                "record store returned a {} without a key",
                T::cache_prefix()
            ))
        })?;

        let key = CacheKeyBuilder::build::<T>(&id);
        self.populate(&key, &saved).await?;
        debug!("✓ Created {}", key);
        Ok(saved)
    }

    /// Persist changes to `record`, then overwrite its cache entry.
    pub async fn update(&self, record: &T) -> Result<T> {
        let id = record.cache_key().ok_or_else(|| {
            Error::ValidationError(format!("cannot update a {} without a key", T::cache_prefix()))
        })?;
        let key = CacheKeyBuilder::build::<T>(&id);

        let affected = self.store.update(record).await?;
        if affected == 0 {
            self.evict_key(&key).await?;
            warn!("⚠ Update of {} matched no record; entry evicted", key);
            return Err(Error::NotFound(key));
        }

        self.populate(&key, record).await?;
        debug!("✓ Updated {} ({} row(s))", key, affected);
        Ok(record.clone())
    }

    /// Evict the cache entry, then delete from the store.
    ///
    /// # Errors
    /// Store failures are returned even though the entry has already been evicted.
    pub async fn delete(&self, id: &T::Key) -> Result<()> {
        let key = CacheKeyBuilder::build::<T>(id);
        self.evict_key(&key).await?;

        let affected = self.store.delete_by_id(id).await.map_err(|e| {
            self.metrics.record_error(&key, &e.to_string());
            e
        })?;
        if affected == 0 {
            debug!("Delete of {} matched no record", key);
        }
        Ok(())
    }

    /// Drop the cache entry for `id` without touching the store.
    pub async fn evict(&self, id: &T::Key) -> Result<bool> {
        self.evict_key(&CacheKeyBuilder::build::<T>(id)).await
    }

    /// Drop every cached entry of this entity type. Returns how many were removed.
    pub async fn evict_all(&self) -> Result<u64> {
        let removed = self
            .client
            .delete_by_pattern(&CacheKeyBuilder::pattern::<T>())
            .await?;
        info!("✓ Evicted {} cached {} entries", removed, T::cache_prefix());
        Ok(removed)
    }

    async fn populate(&self, key: &str, record: &T) -> Result<()> {
        let timer = Instant::now();
        self.client.set_entity(key, record, self.ttl()).await?;
        self.metrics.record_set(key, timer.elapsed());
        Ok(())
    }

    async fn evict_key(&self, key: &str) -> Result<bool> {
        let timer = Instant::now();
        let existed = self.client.delete(key).await?;
        self.metrics.record_delete(key, timer.elapsed());
        Ok(existed)
    }
}

impl<T, B, R> EntityService<T> for CacheAside<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    async fn create(&self, record: &T) -> Result<T> {
        CacheAside::create(self, record).await
    }

    async fn read(&self, id: &T::Key) -> Result<Option<T>> {
        CacheAside::read(self, id).await
    }

    async fn update(&self, record: &T) -> Result<T> {
        CacheAside::update(self, record).await
    }

    async fn delete(&self, id: &T::Key) -> Result<()> {
        CacheAside::delete(self, id).await
    }
}
