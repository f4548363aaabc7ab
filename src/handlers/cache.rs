use async_trait::async_trait;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Failure from a cache backend. The in-process store never fails; remote
/// stores report connection and protocol errors through this.
#[derive(Debug, Error)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub inserted_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

/// Key/value storage behind the coordinator. Implementations may be remote
/// and fail; the coordinator treats any failure as a miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix`, returning how many were dropped
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.write().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}

/// Cache-aside lookups over a shared store.
///
/// Concurrent misses on one key are not coordinated: each caller runs its own
/// compute and the last write wins. Compute functions must be pure reads.
#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        CacheCoordinator { store }
    }

    /// Returns the cached value for `key` if it is younger than `ttl`,
    /// otherwise runs `compute` and caches its `Ok` result.
    /// Errors from `compute` are returned untouched and never cached.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(key, ttl).await {
            return Ok(hit);
        }

        debug!("Cache miss for {}", key);
        let value = compute().await?;

        match serde_json::to_value(&value) {
            Ok(payload) => {
                let entry = CacheEntry {
                    value: payload,
                    inserted_at: Instant::now(),
                };
                if let Err(e) = self.store.set(key, entry).await {
                    warn!("Failed to cache {}: {}", key, e);
                }
            }
            Err(e) => warn!("Value for {} is not cacheable: {}", key, e),
        }

        Ok(value)
    }

    /// Drops every entry whose key starts with `prefix`. Store failures are
    /// logged; the ttl still bounds how long a stale entry can be served.
    ///
    /// A read whose compute started before the write can still land its old
    /// value after this runs. That entry lives at most one ttl.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        match self.store.delete_prefix(prefix).await {
            Ok(0) => {}
            Ok(count) => debug!("Evicted {} cache entries under {}", count, prefix),
            Err(e) => warn!("Failed to evict cache entries under {}: {}", prefix, e),
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read for {} failed, computing directly: {}", key, e);
                return None;
            }
        };

        if entry.is_expired(ttl, Instant::now()) {
            if let Err(e) = self.store.delete(key).await {
                warn!("Failed to evict expired entry {}: {}", key, e);
            }
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Cached entry {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::all_models::Product;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(10);
    const KEY: &str = "product_1001_West Malaysia";

    fn product() -> Product {
        Product {
            id: 1,
            product_code: "1001".into(),
            location: "West Malaysia".into(),
            price: 300.0,
        }
    }

    async fn fetch(calls: &AtomicUsize) -> Result<Product, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(product())
    }

    fn coordinator() -> CacheCoordinator {
        let _ = env_logger::builder().is_test(true).try_init();
        CacheCoordinator::new(Arc::new(MemoryCacheStore::new()))
    }

    /// Store whose every call fails.
    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _key: &str, _entry: CacheEntry) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_served_from_cache() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let first: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        let second: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();

        assert_eq!(first, product());
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(9)).await;
        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_expired_exactly_at_ttl() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        tokio::time::advance(TTL).await;
        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_returned_and_not_cached() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let missing: Result<Product, String> = cache
            .get_or_compute(KEY, TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("Product information not found!".to_string())
            })
            .await;
        assert_eq!(missing.unwrap_err(), "Product information not found!");

        let found: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        assert_eq!(found, product());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        let _: Product = cache
            .get_or_compute("product_1001_East Malaysia", TTL, || fetch(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_store_falls_back_to_compute() {
        let cache = CacheCoordinator::new(Arc::new(DownStore));
        let calls = AtomicUsize::new(0);

        let first: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        let second: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // eviction failures are swallowed
        cache.invalidate_prefix("product_1001_").await;
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_prefix_forces_recompute() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        let _: Product = cache
            .get_or_compute("product_2002_West Malaysia", TTL, || fetch(&calls))
            .await
            .unwrap();

        cache.invalidate_prefix("product_1001_").await;

        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        let _: Product = cache
            .get_or_compute("product_2002_West Malaysia", TTL, || fetch(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shape_mismatch_is_treated_as_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        store
            .set(
                KEY,
                CacheEntry {
                    value: Value::String("stale format".into()),
                    inserted_at: Instant::now(),
                },
            )
            .await
            .unwrap();

        let cache = CacheCoordinator::new(store);
        let calls = AtomicUsize::new(0);
        let value: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();

        assert_eq!(value, product());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_store_prefix_delete_counts() {
        let store = MemoryCacheStore::new();
        for key in ["product_1_a", "product_1_b", "product_10_a"] {
            store
                .set(
                    key,
                    CacheEntry {
                        value: Value::Null,
                        inserted_at: Instant::now(),
                    },
                )
                .await
                .unwrap();
        }

        assert_eq!(store.delete_prefix("product_1_").await.unwrap(), 2);
        assert!(store.get("product_10_a").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_each_compute_and_last_write_wins() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let priced = |price: f64, delay: u64| {
            let calls = &calls;
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(delay)).await;
                Ok::<_, String>(Product { price, ..product() })
            }
        };

        let (fast, slow): (Result<Product, String>, Result<Product, String>) = tokio::join!(
            cache.get_or_compute(KEY, TTL, priced(100.0, 1)),
            cache.get_or_compute(KEY, TTL, priced(200.0, 2)),
        );
        assert_eq!(fast.unwrap().price, 100.0);
        assert_eq!(slow.unwrap().price, 200.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let cached: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        assert_eq!(cached.price, 200.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn read_finishing_after_eviction_is_bounded_by_ttl() {
        let cache = coordinator();
        let calls = AtomicUsize::new(0);

        let stale_read = cache.get_or_compute(KEY, TTL, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, String>(product())
        });
        let write = async {
            cache.invalidate_prefix("product_1001_").await;
        };
        let (stale, ()) = tokio::join!(stale_read, write);
        assert_eq!(stale.unwrap(), product());

        // the pre-write value was cached after the eviction ran
        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(TTL).await;
        let _: Product = cache.get_or_compute(KEY, TTL, || fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
