//! # shelf-cache
//!
//! A cache-aside layer in front of a record store, plus a typed client for a
//! Redis-shaped key-value cache.
//!
//! ## Features
//!
//! - **Cache-aside orchestration:** [`CacheAside`] keeps `book::<id>` snapshots
//!   consistent with the store (persist first on writes, evict first on delete)
//! - **Declarative policies:** [`PolicyCache`] gets the same contract from
//!   per-operation [`CachePolicy`](policy::CachePolicy) wrappers
//! - **Typed client:** [`CacheClient`] covers scalars, counters, hashes, lists,
//!   sets and sorted sets with TTL-in-seconds conventions
//! - **Backend agnostic:** in-memory (default) and Redis (`redis` feature)
//! - **Store agnostic:** implement [`RecordStore`] over any persistence layer
//!
//! ## Quick Start
//!
//! ```
//! use shelf_cache::repository::InMemoryRecordStore;
//! use shelf_cache::{Book, CacheAside, CacheClient, EntityService, InMemoryBackend};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> shelf_cache::Result<()> {
//! let client = CacheClient::new(InMemoryBackend::new());
//! let books = CacheAside::new(client.clone(), Arc::new(InMemoryRecordStore::<Book>::new()));
//!
//! let saved = books.create(&Book::new("Go in Action", "W. Kennedy")).await?;
//! let id = saved.id.expect("store assigns an id");
//!
//! // Served from `book::<id>` without a store round-trip.
//! assert_eq!(books.read(&id).await?, Some(saved));
//!
//! books.delete(&id).await?;
//! assert!(!client.exists(&format!("book::{}", id)).await?);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod book;
pub mod client;
pub mod entity;
pub mod error;
pub mod key;
pub mod observability;
pub mod orchestrator;
pub mod policy;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod strategy;

// Re-exports for convenience
pub use backend::{CacheBackend, InMemoryBackend};
pub use book::Book;
pub use client::{CacheClient, TTL_ABSENT};
pub use entity::{AssignKey, CacheEntity};
pub use error::{Error, Result};
pub use orchestrator::CacheAside;
pub use policy::PolicyCache;
pub use repository::RecordStore;
pub use service::EntityService;
pub use strategy::CacheStrategy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
