use super::MemoryCacheConfig;
use anyhow::Result;
use moka::future::Cache;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

#[derive(Clone)]
pub struct MokaCacheImpl<K, V> {
    cache: Cache<K, V>,
}

impl<K, V> fmt::Debug for MokaCacheImpl<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaCacheImpl").finish_non_exhaustive()
    }
}

impl<K, V> MokaCacheImpl<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_sec))
            .build();
        Self { cache }
    }

    /// Resolve through the cache; only `Some` results are stored.
    pub async fn with_cache_if_some<F, Fut>(&self, key: &K, f: F) -> Result<Option<V>>
    where
        K: Clone,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<V>>> + Send,
    {
        if let Some(v) = self.cache.get(key).await {
            tracing::trace!("memory cache hit");
            return Ok(Some(v));
        }
        let value = f().await?;
        if let Some(v) = value.as_ref() {
            self.cache.insert(key.clone(), v.clone()).await;
        }
        Ok(value)
    }

    pub async fn delete_cache(&self, key: &K) -> Option<V> {
        self.cache.remove(key).await
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_with_cache_if_some() -> Result<()> {
        let cache = MokaCacheImpl::<Arc<String>, i64>::new(&MemoryCacheConfig {
            max_capacity: 10,
            ttl_sec: 60,
        });
        let calls = AtomicUsize::new(0);
        let key = Arc::new("k".to_string());
        for _ in 0..3 {
            let v = cache
                .with_cache_if_some(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(7))
                })
                .await?;
            assert_eq!(v, Some(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // None is not cached
        let missing = Arc::new("missing".to_string());
        for _ in 0..2 {
            let v = cache
                .with_cache_if_some(&missing, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await?;
            assert_eq!(v, None);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert_eq!(cache.delete_cache(&key).await, Some(7));
        assert_eq!(cache.delete_cache(&key).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MokaCacheImpl::<Arc<String>, i64>::new(&MemoryCacheConfig::default());
        let key = Arc::new("a".to_string());
        let _ = cache
            .with_cache_if_some(&key, || async { Ok(Some(1)) })
            .await;
        cache.clear().await;
        assert_eq!(cache.delete_cache(&key).await, None);
    }
}
