//! Redis Backend Integration Tests
//!
//! These tests require a running Redis instance and are skipped when none answers.
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis:7
//! cargo test --features redis --test redis_integration_test
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
//!
//! Every test works under its own key namespace so runs can share a server.

#![cfg(feature = "redis")]

use shelf_cache::backend::{CacheBackend, RedisBackend};
use shelf_cache::repository::InMemoryRecordStore;
use shelf_cache::{Book, CacheAside, CacheClient, EntityService, Error, PolicyCache, TTL_ABSENT};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Helper: Get Redis connection URL from environment or use default
fn get_redis_url() -> String {
    env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Helper: Connect, or `None` when Redis is not reachable.
async fn connect() -> Option<CacheClient<RedisBackend>> {
    let backend = RedisBackend::from_connection_string(&get_redis_url())
        .await
        .ok()?;
    match backend.health_check().await {
        Ok(true) => Some(CacheClient::new(backend)),
        _ => {
            println!("⚠️  Redis not available, skipping test");
            None
        }
    }
}

/// Namespace unique to one test run.
fn namespace(test: &str) -> String {
    format!(
        "shelf-test::{}::{}",
        test,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

/// First id used by a test's record store, far from any other run's ids.
fn id_base() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// =============================================================================
// Client semantics
// =============================================================================

#[tokio::test]
async fn test_redis_scalars_and_ttl() {
    let Some(client) = connect().await else {
        return;
    };
    let ns = namespace("scalars");
    let key = format!("{}::title", ns);

    client
        .set_value(&key, &"Go in Action", Some(30))
        .await
        .expect("set");
    assert_eq!(
        client.get_value::<String>(&key).await.expect("get"),
        Some("Go in Action".to_string())
    );
    let ttl = client.get_ttl(&key).await.expect("ttl");
    assert!(ttl > 0 && ttl <= 30, "ttl was {}", ttl);

    client.set_value(&key, &"Rust in Action", None).await.expect("set");
    assert_eq!(client.get_ttl(&key).await.expect("ttl"), 0);

    assert!(!client.expire(&key, 0).await.expect("expire"));
    assert!(client.expire(&key, 5).await.expect("expire"));

    assert!(client.delete(&key).await.expect("delete"));
    assert_eq!(client.get_ttl(&key).await.expect("ttl"), TTL_ABSENT);
}

#[tokio::test]
async fn test_redis_counters() {
    let Some(client) = connect().await else {
        return;
    };
    let key = format!("{}::stock", namespace("counters"));

    client.set_value(&key, &10, None).await.expect("set");
    assert_eq!(client.increment(&key, 5).await.expect("incr"), 15);
    assert_eq!(client.decrement(&key, 20).await.expect("decr"), -5);
    assert!(matches!(
        client.increment(&key, -1).await,
        Err(Error::InvalidArgument(_))
    ));

    client.delete(&key).await.expect("cleanup");
}

#[tokio::test]
async fn test_redis_collections() {
    let Some(client) = connect().await else {
        return;
    };
    let ns = namespace("collections");
    let (hash, list, set, zset) = (
        format!("{}::meta", ns),
        format!("{}::readers", ns),
        format!("{}::tags", ns),
        format!("{}::rank", ns),
    );

    client.hash_set(&hash, "pages", &264, Some(60)).await.expect("hset");
    assert_eq!(client.hash_get::<i32>(&hash, "pages").await.expect("hget"), Some(264));
    assert!(client.get_ttl(&hash).await.expect("ttl") > 0);

    client
        .list_append_all(&list, &["ada", "grace", "ada"], None)
        .await
        .expect("rpush");
    assert_eq!(
        client.list_range::<String>(&list, -2, -1).await.expect("lrange"),
        vec!["grace", "ada"]
    );
    assert_eq!(client.list_remove_value(&list, &"ada").await.expect("lrem"), 2);

    assert_eq!(client.set_add(&set, &["go", "rust", "go"], None).await.expect("sadd"), 2);
    assert!(client.set_contains(&set, &"rust").await.expect("sismember"));

    client.z_add(&zset, &"b", 2.0).await.expect("zadd");
    client.z_add(&zset, &"a", 1.0).await.expect("zadd");
    assert_eq!(
        client.z_range_by_score::<String>(&zset, 0.0, 5.0).await.expect("zrange"),
        vec!["a", "b"]
    );

    match client.list_append(&hash, &1, None).await {
        Err(Error::BackendError(msg)) => assert!(msg.contains("WRONGTYPE"), "{}", msg),
        other => panic!("Expected WRONGTYPE, got {:?}", other),
    }

    let removed = client
        .delete_by_pattern(&format!("{}::*", ns))
        .await
        .expect("delete_by_pattern");
    assert_eq!(removed, 4);
}

#[tokio::test]
async fn test_redis_delete_by_pattern_spans_scan_batches() {
    let Some(client) = connect().await else {
        return;
    };
    let ns = namespace("scan");
    for i in 0..250 {
        client
            .set_value(&format!("{}::{}", ns, i), &i, None)
            .await
            .expect("set");
    }
    let other = format!("{}-other", ns);
    client.set_value(&other, &1, None).await.expect("set");

    let removed = client
        .delete_by_pattern(&format!("{}::*", ns))
        .await
        .expect("delete_by_pattern");
    assert_eq!(removed, 250);
    assert!(client.exists(&other).await.expect("exists"));

    client.delete(&other).await.expect("cleanup");
}

// =============================================================================
// Cache-aside over Redis
// =============================================================================

#[tokio::test]
async fn test_redis_book_lifecycle() {
    let Some(client) = connect().await else {
        return;
    };
    let base = id_base();
    let store = Arc::new(InMemoryRecordStore::<Book>::starting_at(base));
    let books = CacheAside::new(client.clone(), Arc::clone(&store));

    let saved = books
        .create(&Book::new("Go in Action", "W. Kennedy").with_publisher("Manning"))
        .await
        .expect("create");
    let key = format!("book::{}", base);
    assert_eq!(saved.id, Some(base));
    assert!(client.exists(&key).await.expect("exists"));

    assert_eq!(books.read(&base).await.expect("read"), Some(saved.clone()));
    assert_eq!(store.calls().finds, 0);

    books
        .update(&saved.with_price(39.99))
        .await
        .expect("update");
    let read = books.read(&base).await.expect("read");
    assert_eq!(read.and_then(|b| b.price), Some(39.99));

    books.delete(&base).await.expect("delete");
    assert_eq!(client.get_ttl(&key).await.expect("ttl"), TTL_ABSENT);
    assert_eq!(books.read(&base).await.expect("read"), None);
}

#[tokio::test]
async fn test_redis_policy_cache_snapshot_ttl() {
    let Some(client) = connect().await else {
        return;
    };
    let base = id_base();
    let books = PolicyCache::new(
        client.clone(),
        Arc::new(InMemoryRecordStore::<Book>::starting_at(base)),
    )
    .with_ttl_policy(shelf_cache::observability::TtlPolicy::Fixed(Duration::from_secs(60)));

    books
        .create(&Book::new("Rust in Action", "T. McNamara"))
        .await
        .expect("create");
    let key = format!("book::{}", base);
    let ttl = client.get_ttl(&key).await.expect("ttl");
    assert!(ttl > 0 && ttl <= 60, "ttl was {}", ttl);

    books.delete(&base).await.expect("delete");
    assert!(!client.exists(&key).await.expect("exists"));
}

#[tokio::test]
async fn test_redis_concurrent_reads() {
    let Some(client) = connect().await else {
        return;
    };
    let base = id_base();
    let store = Arc::new(InMemoryRecordStore::<Book>::starting_at(base));
    let books = CacheAside::new(client.clone(), Arc::clone(&store));
    books
        .create(&Book::new("Concurrency in Go", "K. Cox-Buday"))
        .await
        .expect("create");

    let reads = futures::future::join_all((0..20).map(|_| books.read(&base))).await;
    assert!(reads
        .iter()
        .all(|r| matches!(r, Ok(Some(b)) if b.id == Some(base))));
    assert_eq!(store.calls().finds, 0);

    books.delete(&base).await.expect("cleanup");
}
