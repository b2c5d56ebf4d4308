//! Integration tests for the tiered cache across both tiers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use alist_gallery::alist::{DirListing, FsEntry};
use alist_gallery::cache::{CacheLookup, DurableStore, MemoryStore, StoreError, TieredCache};

fn sample_listing() -> DirListing {
    DirListing {
        content: vec![
            FsEntry {
                name: "beach.jpg".to_string(),
                size: 2048,
                is_dir: false,
                modified: "2024-06-15T09:00:00Z".to_string(),
                sign: "s1".to_string(),
                thumb: "https://host/t/beach.jpg".to_string(),
                kind: 5,
            },
            FsEntry {
                name: "raw".to_string(),
                size: 0,
                is_dir: true,
                modified: "2024-06-15T08:00:00Z".to_string(),
                sign: String::new(),
                thumb: String::new(),
                kind: 1,
            },
        ],
        total: 2,
        readme: String::new(),
        write: true,
        provider: "Local".to_string(),
    }
}

fn cache_over(store: Arc<MemoryStore>, memory_ttl: Duration) -> TieredCache {
    TieredCache::new(store, memory_ttl, Duration::from_secs(3600))
}

/// Durable store whose backend is unreachable
struct OfflineStore;

#[async_trait]
impl DurableStore for OfflineStore {
    async fn set(&self, _key: &str, _value: &Value, _ttl_seconds: u64) -> Result<(), StoreError> {
        Err(StoreError::Connection("backend offline".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Connection("backend offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Connection("backend offline".to_string()))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

#[tokio::test]
async fn test_listing_roundtrip_served_from_memory() {
    let cache = cache_over(Arc::new(MemoryStore::new()), Duration::from_secs(60));

    cache.set("files_/photos", &sample_listing()).await;

    match cache.get::<DirListing>("files_/photos").await {
        CacheLookup::Memory(listing) => assert_eq!(listing, sample_listing()),
        other => panic!("expected memory hit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_memory_expiry_falls_back_to_durable_and_repopulates() {
    let cache = cache_over(Arc::new(MemoryStore::new()), Duration::from_millis(20));

    cache.set("counter", &7u32).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Memory entry expired, the durable tier still holds the value.
    assert_eq!(cache.get::<u32>("counter").await, CacheLookup::Durable(7));
    // The durable hit repopulated the memory tier.
    assert_eq!(cache.get::<u32>("counter").await, CacheLookup::Memory(7));
}

#[tokio::test]
async fn test_durable_tier_survives_a_fresh_memory_tier() {
    let store = Arc::new(MemoryStore::new());

    let first = cache_over(store.clone(), Duration::from_secs(60));
    first.set("files_/photos", &sample_listing()).await;

    // A second cache over the same store models a restarted process.
    let second = cache_over(store, Duration::from_secs(60));
    match second.get::<DirListing>("files_/photos").await {
        CacheLookup::Durable(listing) => assert_eq!(listing.content.len(), 2),
        other => panic!("expected durable hit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_clear_empties_memory_but_not_durable() {
    let cache = cache_over(Arc::new(MemoryStore::new()), Duration::from_secs(60));

    cache.set("k", &1u32).await;
    cache.clear();

    assert_eq!(cache.get::<u32>("k").await, CacheLookup::Durable(1));
}

#[tokio::test]
async fn test_delete_removes_both_tiers() {
    let cache = cache_over(Arc::new(MemoryStore::new()), Duration::from_secs(60));

    cache.set("k", &1u32).await;
    cache.delete("k").await;

    assert_eq!(cache.get::<u32>("k").await, CacheLookup::Miss);
}

#[tokio::test]
async fn test_set_local_never_reaches_the_durable_tier() {
    let cache = cache_over(Arc::new(MemoryStore::new()), Duration::from_secs(60));

    cache.set_local("k", &1u32, Duration::from_secs(60));
    assert_eq!(cache.get::<u32>("k").await, CacheLookup::Memory(1));

    cache.clear();
    assert_eq!(cache.get::<u32>("k").await, CacheLookup::Miss);
}

#[tokio::test]
async fn test_absent_key_is_a_miss() {
    let cache = cache_over(Arc::new(MemoryStore::new()), Duration::from_secs(60));

    assert_eq!(cache.get::<u32>("absent").await, CacheLookup::Miss);
    assert_eq!(cache.get::<u32>("absent").await.value(), None);
}

#[tokio::test]
async fn test_offline_backend_degrades_without_raising() {
    let cache = TieredCache::new(
        Arc::new(OfflineStore),
        Duration::from_secs(60),
        Duration::from_secs(3600),
    );

    // The failed durable write is swallowed; memory still serves.
    cache.set("k", &1u32).await;
    assert_eq!(cache.get::<u32>("k").await, CacheLookup::Memory(1));

    // With memory emptied the failing backend reads as unavailable.
    cache.clear();
    assert_eq!(cache.get::<u32>("k").await, CacheLookup::Unavailable);
    assert_eq!(cache.get::<u32>("k").await.value(), None);
}
