//! Book service walkthrough: cache-aside over an in-memory record store.
//!
//! ```bash
//! cargo run --example book_service
//! # Against Redis instead of the in-memory backend:
//! REDIS_URL=redis://localhost:6379 cargo run --example book_service --features redis
//! ```

use chrono::NaiveDate;
use shelf_cache::backend::CacheBackend;
use shelf_cache::observability::{CountingMetrics, TtlPolicy};
use shelf_cache::repository::InMemoryRecordStore;
use shelf_cache::{
    Book, CacheAside, CacheClient, EntityService, InMemoryBackend, PolicyCache, Result,
};
use std::sync::Arc;
use std::time::Duration;

async fn run<B: CacheBackend>(client: CacheClient<B>) -> Result<()> {
    let metrics = Arc::new(CountingMetrics::new());
    let store = Arc::new(InMemoryRecordStore::<Book>::starting_at(7));
    let books = CacheAside::new(client.clone(), Arc::clone(&store))
        .with_ttl_policy(TtlPolicy::Fixed(Duration::from_secs(3600)))
        .with_metrics(metrics.clone());

    // 1. Create: persisted first, then cached under book::<id>
    println!("1. Creating a book...");
    let draft = Book::new("Go in Action", "W. Kennedy")
        .with_publisher("Manning")
        .with_publish_date(NaiveDate::from_ymd_opt(2015, 11, 1).unwrap_or_default());
    let saved = books.create(&draft).await?;
    let id = saved.id.unwrap_or_default();
    let ttl = client.get_ttl(&format!("book::{}", id)).await?;
    println!("   ✓ Stored as book::{} (ttl {}s)\n", id, ttl);

    // 2. Read: answered by the cache
    println!("2. Reading book::{}...", id);
    if let Some(book) = books.read(&id).await? {
        println!(
            "   ✓ {} by {} (store reads so far: {})\n",
            book.title,
            book.author,
            store.calls().finds
        );
    }

    // 3. Update: store first, then the entry is overwritten
    println!("3. Repricing...");
    let repriced = books.update(&saved.with_price(39.99)).await?;
    println!("   ✓ New price {:?}\n", repriced.price);

    // 4. Auxiliary structures next to the snapshot
    println!("4. Tracking readers and views...");
    let readers = format!("book::{}::readers", id);
    client
        .list_append_all(&readers, &["ada", "grace"], Some(600))
        .await?;
    let views = client.increment(&format!("book::{}::views", id), 1).await?;
    println!(
        "   ✓ readers={:?} views={}\n",
        client.list_range::<String>(&readers, 0, -1).await?,
        views
    );

    // 5. Delete: entry evicted before the store delete; the next read misses
    println!("5. Deleting...");
    books.delete(&id).await?;
    println!("   ✓ Read after delete: {:?}", books.read(&id).await?);
    println!("   ✓ Cleared {} auxiliary keys\n", books.evict_all().await?);

    // 6. The declarative variant behaves the same
    println!("6. Policy-driven service...");
    let policy_books = PolicyCache::new(
        client.clone(),
        Arc::new(InMemoryRecordStore::<Book>::new()),
    );
    let saved = policy_books
        .create(&Book::new("Rust in Action", "T. McNamara"))
        .await?;
    let id = saved.id.unwrap_or_default();
    println!("   ✓ Cached: {}", client.exists(&format!("book::{}", id)).await?);
    policy_books.delete(&id).await?;
    println!("   ✓ Evicted: {}\n", !client.exists(&format!("book::{}", id)).await?);

    println!("Metrics: {:?}", metrics.snapshot());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== shelf-cache - Book Service ===\n");

    #[cfg(feature = "redis")]
    {
        if let Ok(url) = std::env::var("REDIS_URL") {
            println!("Using Redis at {}\n", url);
            let backend = shelf_cache::backend::RedisBackend::from_connection_string(&url).await?;
            return run(CacheClient::new(backend)).await;
        }
    }

    println!("Using the in-memory backend\n");
    run(CacheClient::new(InMemoryBackend::new())).await
}
