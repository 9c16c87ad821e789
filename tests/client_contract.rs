//! Contract tests for `CacheClient`.
//!
//! `CountingBackend` wraps the in-memory backend and counts every command it
//! receives, so the tests can tell "rejected locally" apart from "sent and
//! answered by the backend".

use shelf_cache::backend::{CacheBackend, InMemoryBackend, KeyTtl, MAX_TTL};
use shelf_cache::{CacheClient, Error, Result, TTL_ABSENT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct CountingBackend {
    inner: InMemoryBackend,
    calls: Arc<AtomicU64>,
    /// Deletes of this key fail with a backend error.
    poisoned: Option<String>,
}

impl CountingBackend {
    fn poisoned(key: &str) -> Self {
        CountingBackend {
            poisoned: Some(key.to_string()),
            ..Default::default()
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CacheBackend for CountingBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.tick();
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.tick();
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.tick();
        if self.poisoned.as_deref() == Some(key) {
            return Err(Error::BackendError(format!("connection lost deleting {}", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.tick();
        self.inner.exists(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.tick();
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.tick();
        self.inner.ttl(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.tick();
        self.inner.keys(pattern).await
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<u64> {
        self.tick();
        self.inner.mdelete(keys).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.tick();
        self.inner.incr_by(key, delta).await
    }

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> Result<()> {
        self.tick();
        self.inner.hset(key, field, value).await
    }

    async fn hset_all(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.tick();
        self.inner.hset_all(key, fields).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        self.tick();
        self.inner.hget(key, field).await
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        self.tick();
        self.inner.hget_all(key).await
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64> {
        self.tick();
        self.inner.hdel(key, fields).await
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        self.tick();
        self.inner.hexists(key, field).await
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<u64> {
        self.tick();
        self.inner.rpush(key, values).await
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>> {
        self.tick();
        self.inner.lindex(key, index).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        self.tick();
        self.inner.lrange(key, start, stop).await
    }

    async fn lrem(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        self.tick();
        self.inner.lrem(key, value).await
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        self.tick();
        self.inner.llen(key).await
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        self.tick();
        self.inner.sadd(key, members).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        self.tick();
        self.inner.smembers(key).await
    }

    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        self.tick();
        self.inner.srem(key, members).await
    }

    async fn sismember(&self, key: &str, member: Vec<u8>) -> Result<bool> {
        self.tick();
        self.inner.sismember(key, member).await
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        self.tick();
        self.inner.scard(key).await
    }

    async fn zadd(&self, key: &str, member: Vec<u8>, score: f64) -> Result<bool> {
        self.tick();
        self.inner.zadd(key, member, score).await
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Vec<u8>>> {
        self.tick();
        self.inner.zrange_by_score(key, min, max).await
    }

    async fn zrem(&self, key: &str, members: Vec<Vec<u8>>) -> Result<u64> {
        self.tick();
        self.inner.zrem(key, members).await
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.tick();
        self.inner.zcard(key).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.tick();
        self.inner.clear_all().await
    }
}

fn client() -> (CacheClient<CountingBackend>, CountingBackend) {
    let backend = CountingBackend::default();
    (CacheClient::new(backend.clone()), backend)
}

// =============================================================================
// TTL semantics
// =============================================================================

#[tokio::test]
async fn test_expire_non_positive_is_local_no_op() {
    let (client, backend) = client();
    client.set_value("book::7", &"x", None).await.expect("set");
    let before = backend.calls();

    assert!(!client.expire("book::7", 0).await.expect("expire"));
    assert!(!client.expire("book::7", -5).await.expect("expire"));
    assert_eq!(backend.calls(), before);
}

#[tokio::test]
async fn test_expire_then_get_ttl_is_bounded() {
    let (client, _) = client();
    client.set_value("book::7", &"x", None).await.expect("set");

    assert!(client.expire("book::7", 10).await.expect("expire"));
    let ttl = client.get_ttl("book::7").await.expect("ttl");
    assert!(ttl > 0 && ttl <= 10, "ttl was {}", ttl);
}

#[tokio::test]
async fn test_get_ttl_conventions() {
    let (client, _) = client();

    assert_eq!(client.get_ttl("nothing").await.expect("ttl"), TTL_ABSENT);

    client.set_value("forever", &1, None).await.expect("set");
    assert_eq!(client.get_ttl("forever").await.expect("ttl"), 0);

    client.set_value("brief", &1, Some(30)).await.expect("set");
    let ttl = client.get_ttl("brief").await.expect("ttl");
    assert!(ttl > 0 && ttl <= 30);
}

#[tokio::test]
async fn test_sub_structure_ttl_is_write_then_expire() {
    let (client, backend) = client();

    let before = backend.calls();
    client
        .list_append("book::7::readers", &"ada", Some(60))
        .await
        .expect("append");
    assert_eq!(backend.calls() - before, 2);

    let before = backend.calls();
    client
        .list_append("book::7::readers", &"grace", None)
        .await
        .expect("append");
    assert_eq!(backend.calls() - before, 1);

    let ttl = client.get_ttl("book::7::readers").await.expect("ttl");
    assert!(ttl > 0 && ttl <= 60);
}

#[tokio::test]
async fn test_largest_ttl_is_clamped_not_fatal() {
    let (client, _) = client();
    let ceiling = i64::try_from(MAX_TTL.as_secs()).expect("fits in i64");
    let far_future = |ttl: i64| ttl > ceiling / 2 && ttl <= ceiling;

    client.set_value("scalar", &1, Some(i64::MAX)).await.expect("set");
    client.set_value("later", &1, None).await.expect("set");
    assert!(client.expire("later", i64::MAX).await.expect("expire"));
    client
        .list_append("list", &"ada", Some(i64::MAX))
        .await
        .expect("rpush");
    client
        .hash_set("hash", "pages", &264, Some(i64::MAX))
        .await
        .expect("hset");
    client
        .set_add("set", &["go"], Some(i64::MAX))
        .await
        .expect("sadd");

    for key in ["scalar", "later", "list", "hash", "set"] {
        let ttl = client.get_ttl(key).await.expect("ttl");
        assert!(far_future(ttl), "{} ttl was {}", key, ttl);
    }
    assert_eq!(client.get_value::<i32>("scalar").await.expect("get"), Some(1));
}

#[tokio::test]
async fn test_nan_score_is_rejected() {
    let (client, _) = client();

    assert!(matches!(
        client.z_add("rank", &"m", f64::NAN).await,
        Err(Error::BackendError(_))
    ));
    assert_eq!(client.z_size("rank").await.expect("zcard"), 0);
}

#[tokio::test]
async fn test_entries_expire() {
    let (client, _) = client();
    client.set_value("flash", &1, Some(1)).await.expect("set");
    client
        .set_add("flash::set", &["a"], Some(1))
        .await
        .expect("sadd");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(client.get_value::<i32>("flash").await.expect("get"), None);
    assert_eq!(client.set_size("flash::set").await.expect("scard"), 0);
    assert_eq!(client.get_ttl("flash").await.expect("ttl"), TTL_ABSENT);
}

// =============================================================================
// Argument validation
// =============================================================================

#[tokio::test]
async fn test_negative_delta_never_reaches_backend() {
    let (client, backend) = client();

    assert!(matches!(
        client.increment("visits", -1).await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        client.decrement("visits", -1).await,
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(backend.calls(), 0);

    assert_eq!(client.increment("visits", 0).await.expect("incr"), 0);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_empty_batches_never_reach_backend() {
    let (client, backend) = client();
    let none: [&str; 0] = [];

    assert_eq!(client.delete_many(&none).await.expect("delete_many"), 0);
    assert_eq!(client.hash_delete("h", &none).await.expect("hdel"), 0);
    assert_eq!(
        client
            .list_append_all::<i32>("l", &[], Some(5))
            .await
            .expect("rpush"),
        0
    );
    assert_eq!(client.set_add::<i32>("s", &[], Some(5)).await.expect("sadd"), 0);
    assert_eq!(client.set_remove::<i32>("s", &[]).await.expect("srem"), 0);
    assert_eq!(client.z_remove::<i32>("z", &[]).await.expect("zrem"), 0);
    client
        .hash_set_all::<i32>("h", &HashMap::new(), Some(5))
        .await
        .expect("hset_all");

    assert_eq!(backend.calls(), 0);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_by_pattern_leaves_unrelated_keys() {
    let (client, _) = client();
    for id in 1..=3 {
        client
            .set_value(&format!("book::{}", id), &id, None)
            .await
            .expect("set");
    }
    client
        .hash_set("book::1::meta", "pages", &264, None)
        .await
        .expect("hset");
    client.set_value("author::1", &"W. Kennedy", None).await.expect("set");
    client.set_value("bookmark::1", &1, None).await.expect("set");

    assert_eq!(client.delete_by_pattern("book::*").await.expect("delete"), 4);
    assert!(client.exists("author::1").await.expect("exists"));
    assert!(client.exists("bookmark::1").await.expect("exists"));

    // Nothing left to match: still not an error.
    assert_eq!(client.delete_by_pattern("book::*").await.expect("delete"), 0);
}

#[tokio::test]
async fn test_delete_many_attempts_every_key() {
    let backend = CountingBackend::poisoned("b");
    let client = CacheClient::new(backend.clone());
    for key in ["a", "b", "c"] {
        client.set_value(key, &1, None).await.expect("set");
    }

    let result = client.delete_many(&["a", "b", "c"]).await;
    assert!(matches!(result, Err(Error::BackendError(_))));

    assert!(!client.exists("a").await.expect("exists"));
    assert!(client.exists("b").await.expect("exists"));
    assert!(!client.exists("c").await.expect("exists"));
}

// =============================================================================
// Typed values
// =============================================================================

#[tokio::test]
async fn test_set_value_overwrites_any_shape() {
    let (client, _) = client();
    client.set_add("k", &[1, 2], None).await.expect("sadd");

    client.set_value("k", &"plain", None).await.expect("set");
    assert_eq!(
        client.get_value::<String>("k").await.expect("get"),
        Some("plain".to_string())
    );
}

#[tokio::test]
async fn test_counter_written_by_set_value() {
    let (client, _) = client();

    client.set_value("stock::7", &10, None).await.expect("set");
    assert_eq!(client.decrement("stock::7", 3).await.expect("decr"), 7);
    assert_eq!(client.increment("stock::7", 1).await.expect("incr"), 8);
    assert_eq!(client.get_value::<i64>("stock::7").await.expect("get"), Some(8));
}

#[tokio::test]
async fn test_list_range_semantics() {
    let (client, _) = client();
    client
        .list_append_all("l", &[10, 20, 30, 40, 50], None)
        .await
        .expect("rpush");

    assert_eq!(
        client.list_range::<i32>("l", 0, -1).await.expect("lrange"),
        vec![10, 20, 30, 40, 50]
    );
    assert_eq!(
        client.list_range::<i32>("l", -3, -2).await.expect("lrange"),
        vec![30, 40]
    );
    assert_eq!(
        client.list_range::<i32>("l", 3, 99).await.expect("lrange"),
        vec![40, 50]
    );
    assert!(client
        .list_range::<i32>("l", 5, 10)
        .await
        .expect("lrange")
        .is_empty());
    assert_eq!(client.list_get_at::<i32>("l", -5).await.expect("lindex"), Some(10));
    assert_eq!(client.list_get_at::<i32>("l", 5).await.expect("lindex"), None);
    assert!(client
        .list_range::<i32>("missing", 0, -1)
        .await
        .expect("lrange")
        .is_empty());
}

#[tokio::test]
async fn test_sorted_set_range_is_inclusive_and_ordered() {
    let (client, _) = client();
    for (member, score) in [("c", 3.0), ("a", 1.0), ("b", 2.0), ("d", 4.0)] {
        client.z_add("rank", &member, score).await.expect("zadd");
    }

    assert_eq!(
        client
            .z_range_by_score::<String>("rank", 2.0, 4.0)
            .await
            .expect("zrange"),
        vec!["b", "c", "d"]
    );
    assert_eq!(client.z_size("rank").await.expect("zcard"), 4);
}

#[tokio::test]
async fn test_type_clash_is_a_backend_error() {
    let (client, _) = client();
    client.list_append("k", &1, None).await.expect("rpush");

    for result in [
        client.hash_set("k", "f", &1, None).await.map(|_| ()),
        client.set_add("k", &[1], None).await.map(|_| ()),
        client.z_add("k", &1, 1.0).await.map(|_| ()),
        client.increment("k", 1).await.map(|_| ()),
    ] {
        match result {
            Err(Error::BackendError(msg)) => assert!(msg.contains("WRONGTYPE"), "{}", msg),
            other => panic!("Expected WRONGTYPE, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_health_check() {
    let (client, _) = client();
    assert!(client.health_check().await.expect("health"));
}
