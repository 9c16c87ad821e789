//! Metrics hooks and TTL policies for the caching strategies.
//!
//! Two concerns live here:
//!
//! - **Metrics (`CacheMetrics`)**: hits, misses, writes, evictions and failures as
//!   seen by [`CacheAside`](crate::orchestrator::CacheAside) and
//!   [`PolicyCache`](crate::policy::PolicyCache)
//! - **TTL Policies (`TtlPolicy`)**: how long an entity snapshot stays cached
//!
//! # Metrics
//!
//! ```ignore
//! use shelf_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("shelf_cache_hits").inc();
//!     }
//! }
//!
//! // let books = CacheAside::new(client, store).with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! # TTL Policies
//!
//! Snapshots never expire unless a policy says otherwise:
//!
//! ```
//! use shelf_cache::observability::TtlPolicy;
//! use std::time::Duration;
//!
//! let _policy = TtlPolicy::Fixed(Duration::from_secs(300));
//!
//! let _policy = TtlPolicy::PerType(|prefix| match prefix {
//!     "book" => Duration::from_secs(3600),
//!     _ => Duration::from_secs(600),
//! });
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a cache delete operation.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// In-process counters, handy for tests and debug endpoints.
#[derive(Default)]
pub struct CountingMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`CountingMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl CacheMetrics for CountingMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _key: &str, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_set(&self, _key: &str, _duration: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delete(&self, _key: &str, _duration: Duration) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, key: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// TTL (Time-to-Live) policy for entity snapshots.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    /// No TTL (entries live until evicted)
    #[default]
    Infinite,

    /// Fixed duration for all entries
    Fixed(Duration),

    /// Duration chosen from the entity's cache prefix
    PerType(fn(&str) -> Duration),
}

impl TtlPolicy {
    /// Get TTL for an entity prefix; zero durations mean no TTL.
    pub fn get_ttl(&self, prefix: &str) -> Option<Duration> {
        let ttl = match self {
            TtlPolicy::Infinite => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::PerType(f) => Some(f(prefix)),
        };
        ttl.filter(|d| !d.is_zero())
    }
}
