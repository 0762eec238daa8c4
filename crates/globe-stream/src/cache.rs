//! Byte caches for fetched tiles.
//!
//! Tiles are keyed by their full request URL, so the same tile fetched from
//! two different servers or subdomains is stored twice. That is harmless for
//! the hybrid layer, whose URLs rotate deterministically.
//!
//! # Implementations
//!
//! - [`MemoryCache`]: In-memory cache with an optional byte budget
//! - [`NoCache`]: Passthrough implementation that caches nothing

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
};

use crate::error::{Error, Result};

/// Future type for cache get operations.
pub type GetFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + 'a>>;

/// Future type for cache put/clear operations.
pub type CacheFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Future type for cache contains operations.
pub type ContainsFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// A cache for storing fetched tile bytes, keyed by URL.
pub trait Cache: Send + Sync {
    /// Get data from the cache.
    ///
    /// Returns `Ok(None)` on a miss.
    fn get(&self, url: &str) -> GetFuture<'_>;

    /// Store data in the cache.
    fn put(&self, url: &str, data: Vec<u8>) -> CacheFuture<'_>;

    /// Check if data exists in the cache without retrieving it.
    fn contains(&self, url: &str) -> ContainsFuture<'_>;

    /// Clear all cached data.
    fn clear(&self) -> CacheFuture<'_>;
}

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _url: &str) -> GetFuture<'_> {
        Box::pin(async { Ok(None) })
    }

    fn put(&self, _url: &str, _data: Vec<u8>) -> CacheFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn contains(&self, _url: &str) -> ContainsFuture<'_> {
        Box::pin(async { Ok(false) })
    }

    fn clear(&self) -> CacheFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// An in-memory tile cache.
///
/// With a byte budget, the oldest inserted tiles are evicted first once the
/// budget would be exceeded. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<RwLock<MemoryCacheInner>>,
    max_bytes: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
    entries: HashMap<String, Vec<u8>>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    bytes: usize,
}

impl MemoryCacheInner {
    fn remove(&mut self, url: &str) {
        if let Some(old) = self.entries.remove(url) {
            self.bytes -= old.len();
            self.order.retain(|k| k != url);
        }
    }

    fn evict_until_fits(&mut self, incoming: usize, max_bytes: usize) {
        while self.bytes + incoming > max_bytes {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(old) = self.entries.remove(&oldest) {
                self.bytes -= old.len();
                tracing::trace!(url = %oldest, "evicted tile");
            }
        }
    }
}

fn poisoned<T>(operation: &'static str) -> impl FnOnce(PoisonError<T>) -> Error {
    move |e| Error::Cache {
        operation,
        message: e.to_string(),
    }
}

impl MemoryCache {
    /// Create a cache with no size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `max_bytes` of tile data.
    #[must_use]
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            inner: Arc::default(),
            max_bytes: Some(max_bytes),
        }
    }

    /// Total bytes currently cached.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.inner.read().map_or(0, |inner| inner.bytes)
    }

    /// Number of cached tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map_or(0, |inner| inner.entries.len())
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put_now(&self, url: &str, data: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned("put"))?;
        inner.remove(url);
        if let Some(max_bytes) = self.max_bytes {
            if data.len() > max_bytes {
                // Would evict everything and still not fit.
                return Ok(());
            }
            inner.evict_until_fits(data.len(), max_bytes);
        }
        inner.bytes += data.len();
        inner.order.push_back(url.to_string());
        inner.entries.insert(url.to_string(), data);
        Ok(())
    }
}

impl Cache for MemoryCache {
    fn get(&self, url: &str) -> GetFuture<'_> {
        let result = self
            .inner
            .read()
            .map(|inner| inner.entries.get(url).cloned())
            .map_err(poisoned("get"));
        Box::pin(async move { result })
    }

    fn put(&self, url: &str, data: Vec<u8>) -> CacheFuture<'_> {
        let result = self.put_now(url, data);
        Box::pin(async move { result })
    }

    fn contains(&self, url: &str) -> ContainsFuture<'_> {
        let result = self
            .inner
            .read()
            .map(|inner| inner.entries.contains_key(url))
            .map_err(poisoned("contains"));
        Box::pin(async move { result })
    }

    fn clear(&self) -> CacheFuture<'_> {
        let result = self.inner.write().map(|mut inner| {
            inner.entries.clear();
            inner.order.clear();
            inner.bytes = 0;
        });
        let result = result.map_err(poisoned("clear"));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_cache() {
        let cache = NoCache;
        cache.put("http://a/vt", vec![1, 2, 3]).await.unwrap();
        assert!(cache.get("http://a/vt").await.unwrap().is_none());
        assert!(!cache.contains("http://a/vt").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_cache_basic() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());

        cache.put("http://a/vt", vec![1, 2, 3]).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes(), 3);
        assert_eq!(cache.get("http://a/vt").await.unwrap(), Some(vec![1, 2, 3]));
        assert!(!cache.contains("http://b/vt").await.unwrap());

        // Replacing an entry does not double-count it.
        cache.put("http://a/vt", vec![1, 2, 3, 4, 5]).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes(), 5);

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.bytes(), 0);
    }

    #[tokio::test]
    async fn test_memory_cache_evicts_oldest() {
        let cache = MemoryCache::with_max_bytes(10);

        cache.put("http://a", vec![0; 5]).await.unwrap();
        cache.put("http://b", vec![0; 5]).await.unwrap();
        assert_eq!(cache.bytes(), 10);

        cache.put("http://c", vec![0; 3]).await.unwrap();
        assert_eq!(cache.bytes(), 8);
        assert!(!cache.contains("http://a").await.unwrap());
        assert!(cache.contains("http://b").await.unwrap());
        assert!(cache.contains("http://c").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_cache_skips_oversized() {
        let cache = MemoryCache::with_max_bytes(4);
        cache.put("http://small", vec![0; 2]).await.unwrap();
        cache.put("http://huge", vec![0; 8]).await.unwrap();

        assert!(cache.contains("http://small").await.unwrap());
        assert!(!cache.contains("http://huge").await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.put("http://a", vec![9]).await.unwrap();
        assert_eq!(other.get("http://a").await.unwrap(), Some(vec![9]));
    }
}
