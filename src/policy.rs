//! Declarative cache policies composed around record store calls.
//!
//! Instead of spelling out cache-aside steps in every operation, each operation of
//! [`PolicyCache`] is wrapped at construction time by a [`CachePolicy`]:
//!
//! | Policy | Before the call | After the call |
//! |--------|-----------------|----------------|
//! | `Cacheable` | return the cached value on hit | cache the result under the argument's key |
//! | `Put` | nothing | cache the result under the result's own key |
//! | `Evict { before_invocation: true }` | delete the entry | nothing (even if the call fails) |
//! | `Evict { before_invocation: false }` | nothing | delete the entry if the call succeeded |
//! | `None` | nothing | nothing |
//!
//! With [`Policies::default`] the observable behaviour matches
//! [`CacheAside`](crate::orchestrator::CacheAside): cached reads, write-through on
//! create and update, evict-before-invoke on delete.
//!
//! The wrappers themselves live on [`CacheDecorator`] and work for any async call:
//!
//! ```
//! use shelf_cache::policy::CacheDecorator;
//! use shelf_cache::{Book, CacheClient, InMemoryBackend};
//!
//! # #[tokio::main]
//! # async fn main() -> shelf_cache::Result<()> {
//! let cache = CacheDecorator::new(CacheClient::new(InMemoryBackend::new()));
//!
//! let book: Option<Book> = cache
//!     .cacheable("book::7", || async {
//!         let mut book = Book::new("Go in Action", "W. Kennedy");
//!         book.id = Some(7);
//!         Ok(Some(book))
//!     })
//!     .await?;
//! assert!(book.is_some());
//! assert!(cache.client().exists("book::7").await?);
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
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Cache behaviour attached to one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve from the cache keyed by the argument; populate on miss.
    Cacheable,
    /// Always invoke, then cache the result keyed by its own identity.
    Put,
    /// Remove the entry keyed by the argument.
    Evict { before_invocation: bool },
    /// Invoke without touching the cache.
    None,
}

/// One policy per [`EntityService`] operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Policies {
    pub read: CachePolicy,
    pub create: CachePolicy,
    pub update: CachePolicy,
    pub delete: CachePolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Policies {
            read: CachePolicy::Cacheable,
            create: CachePolicy::Put,
            update: CachePolicy::Put,
            delete: CachePolicy::Evict {
                before_invocation: true,
            },
        }
    }
}

/// Cache wrappers for arbitrary async operations.
#[derive(Clone)]
pub struct CacheDecorator<B: CacheBackend> {
    client: CacheClient<B>,
    ttl_policy: TtlPolicy,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> CacheDecorator<B> {
    pub fn new(client: CacheClient<B>) -> Self {
        CacheDecorator {
            client,
            ttl_policy: TtlPolicy::default(),
            metrics: Arc::new(NoOpMetrics),
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

    /// Return the entity cached under `key`, or run `op` and cache its result.
    ///
    /// A `None` result is returned as is and not cached.
    pub async fn cacheable<T, F, Fut>(&self, key: &str, op: F) -> Result<Option<T>>
    where
        T: CacheEntity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let timer = Instant::now();
        if let Some(hit) = self.client.get_entity_or_evict::<T>(key).await? {
            self.metrics.record_hit(key, timer.elapsed());
            return Ok(Some(hit));
        }
        self.metrics.record_miss(key, timer.elapsed());

        let loaded = op().await?;
        if let Some(entity) = &loaded {
            self.store_entity(key, entity).await?;
        }
        Ok(loaded)
    }

    /// Run `op`, then cache its result under the result's own key.
    ///
    /// # Errors
    /// `Error::ValidationError` when the result has no key.
    pub async fn put<T, F, Fut>(&self, op: F) -> Result<T>
    where
        T: CacheEntity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let entity = op().await?;
        let id = entity.cache_key().ok_or_else(|| {
            Error::ValidationError(format!(
                "cannot cache a {} without a key",
                T::cache_prefix()
            ))
        })?;

        self.store_entity(&CacheKeyBuilder::build::<T>(&id), &entity)
            .await?;
        Ok(entity)
    }

    /// Run `op` and remove `key`, before the call or after a successful one.
    pub async fn evict<O, F, Fut>(&self, key: &str, before_invocation: bool, op: F) -> Result<O>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        if before_invocation {
            self.evict_key(key).await?;
            return op().await;
        }

        let output = op().await?;
        self.evict_key(key).await?;
        Ok(output)
    }

    async fn store_entity<T: CacheEntity>(&self, key: &str, entity: &T) -> Result<()> {
        let timer = Instant::now();
        let ttl = self.ttl_policy.get_ttl(T::cache_prefix());
        self.client.set_entity(key, entity, ttl).await?;
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

/// Entity service whose cache behaviour is chosen per operation at construction.
pub struct PolicyCache<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    decorator: CacheDecorator<B>,
    store: Arc<R>,
    policies: Policies,
    _entity: PhantomData<fn() -> T>,
}

impl<T, B, R> Clone for PolicyCache<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    fn clone(&self) -> Self {
        PolicyCache {
            decorator: self.decorator.clone(),
            store: Arc::clone(&self.store),
            policies: self.policies,
            _entity: PhantomData,
        }
    }
}

impl<T, B, R> PolicyCache<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    /// Build with [`Policies::default`] and no TTL.
    pub fn new(client: CacheClient<B>, store: Arc<R>) -> Self {
        PolicyCache {
            decorator: CacheDecorator::new(client),
            store,
            policies: Policies::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    /// Set custom TTL policy.
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.decorator = self.decorator.with_ttl_policy(policy);
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.decorator = self.decorator.with_metrics(metrics);
        self
    }

    pub fn policies(&self) -> Policies {
        self.policies
    }

    pub fn client(&self) -> &CacheClient<B> {
        self.decorator.client()
    }

    pub fn store(&self) -> &Arc<R> {
        &self.store
    }

    /// Apply a result-keyed write policy to `op`.
    async fn write<F, Fut>(&self, policy: CachePolicy, key: Option<&str>, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match (policy, key) {
            (CachePolicy::Put, _) | (CachePolicy::Cacheable, _) => self.decorator.put(op).await,
            (CachePolicy::Evict { before_invocation }, Some(key)) => {
                self.decorator.evict(key, before_invocation, op).await
            }
            (CachePolicy::Evict { .. }, None) => {
                // No key before the call: evict whatever the result is keyed by.
                let entity = op().await?;
                if let Some(id) = entity.cache_key() {
                    self.decorator
                        .evict_key(&CacheKeyBuilder::build::<T>(&id))
                        .await?;
                }
                Ok(entity)
            }
            (CachePolicy::None, _) => op().await,
        }
    }
}

impl<T, B, R> EntityService<T> for PolicyCache<T, B, R>
where
    T: CacheEntity,
    B: CacheBackend,
    R: RecordStore<T>,
{
    async fn create(&self, record: &T) -> Result<T> {
        let store = &self.store;
        let saved = self
            .write(self.policies.create, None, || store.insert(record))
            .await?;
        if saved.cache_key().is_none() {
            return Err(Error::ValidationError(format!(
                "record store returned a {} without a key",
                T::cache_prefix()
            )));
        }
        Ok(saved)
    }

    async fn read(&self, id: &T::Key) -> Result<Option<T>> {
        let key = CacheKeyBuilder::build::<T>(id);
        let store = &self.store;
        debug!("» Policy read for key: {} ({:?})", key, self.policies.read);

        match self.policies.read {
            CachePolicy::Cacheable => self.decorator.cacheable(&key, || store.find_by_id(id)).await,
            CachePolicy::Put => {
                let found = store.find_by_id(id).await?;
                if let Some(entity) = &found {
                    self.decorator.store_entity(&key, entity).await?;
                }
                Ok(found)
            }
            CachePolicy::Evict { before_invocation } => {
                self.decorator
                    .evict(&key, before_invocation, || store.find_by_id(id))
                    .await
            }
            CachePolicy::None => store.find_by_id(id).await,
        }
    }

    async fn update(&self, record: &T) -> Result<T> {
        let id = record.cache_key().ok_or_else(|| {
            Error::ValidationError(format!("cannot update a {} without a key", T::cache_prefix()))
        })?;
        let key = CacheKeyBuilder::build::<T>(&id);
        let store = &self.store;
        let missing = key.as_str();

        let result = self
            .write(self.policies.update, Some(&key), move || async move {
                match store.update(record).await? {
                    0 => Err(Error::NotFound(missing.to_string())),
                    _ => Ok(record.clone()),
                }
            })
            .await;

        if let Err(Error::NotFound(_)) = &result {
            self.decorator.evict_key(&key).await?;
            warn!("⚠ Update of {} matched no record; entry evicted", key);
        }
        result
    }

    async fn delete(&self, id: &T::Key) -> Result<()> {
        let key = CacheKeyBuilder::build::<T>(id);
        let store = &self.store;
        let op = move || async move { store.delete_by_id(id).await.map(|_| ()) };

        match self.policies.delete {
            CachePolicy::Evict { before_invocation } => {
                self.decorator.evict(&key, before_invocation, op).await
            }
            // Nothing to cache for a deletion; the other policies just invoke.
            CachePolicy::Cacheable | CachePolicy::Put | CachePolicy::None => op().await,
        }
    }
}
