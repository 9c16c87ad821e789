//! Read strategies for [`CacheAside::read_with`](crate::orchestrator::CacheAside::read_with).
//!
//! A plain `read` is `CacheStrategy::Refresh`. The other variants exist for the
//! cases where the caller knows more than the cache does.
//!
//! | Strategy | Cache Hit | Cache Miss | Use Case |
//! |----------|-----------|-----------|----------|
//! | **Fresh** | Return | Return None | Hot path that must not touch the store |
//! | **Refresh** | Return | Store fallback, populate | Default |
//! | **Invalidate** | Evict, reload | Store fallback, populate | Suspected stale entry |
//! | **Bypass** | Ignored | Store, populate | Reconciling after out-of-band writes |
//!
//! ```
//! use shelf_cache::strategy::CacheStrategy;
//!
//! assert_eq!(CacheStrategy::default(), CacheStrategy::Refresh);
//! ```

/// Strategy enum controlling how a read consults the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Cache only. A miss answers `None` without asking the store.
    Fresh,

    /// Cache first, store on miss, then populate.
    #[default]
    Refresh,

    /// Evict the entry, then reload from the store and populate.
    Invalidate,

    /// Skip the cache lookup, read the store and populate for later readers.
    Bypass,
}

impl CacheStrategy {
    /// True when the strategy consults the cache before the store.
    pub fn reads_cache(self) -> bool {
        matches!(self, CacheStrategy::Fresh | CacheStrategy::Refresh)
    }

    /// True when a cache miss may fall back to the record store.
    pub fn falls_back_to_store(self) -> bool {
        !matches!(self, CacheStrategy::Fresh)
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Fresh => write!(f, "Fresh"),
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Invalidate => write!(f, "Invalidate"),
            CacheStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}
