//! Per-source caches for rank and channel lists.
//!
//! Owned by the plot service and passed by reference; entries are
//! refetched once older than the configured TTL.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use plot_common::{Channel, PlotResult, Rank};
use tokio::sync::RwLock;
use tracing::debug;

struct CacheEntry<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

/// Hit/miss counters, atomic for lock-free reads.
#[derive(Debug, Default)]
pub struct SourceCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

/// A TTL cache keyed by logical source name.
pub struct SourceCache<T> {
    label: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    stats: SourceCacheStats,
}

impl<T: Send + Sync> SourceCache<T> {
    pub fn new(label: &'static str, ttl: Duration) -> Self {
        Self {
            label,
            ttl,
            entries: RwLock::new(HashMap::new()),
            stats: SourceCacheStats::default(),
        }
    }

    /// Cached value for `source` if still fresh.
    pub async fn get(&self, source: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().await;
        entries
            .get(source)
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    pub async fn insert(&self, source: &str, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries.write().await.insert(
            source.to_string(),
            CacheEntry {
                value: value.clone(),
                fetched_at: Instant::now(),
            },
        );
        value
    }

    /// Return the cached value or fetch, store and return a fresh one.
    ///
    /// A failed fetch leaves the cache untouched.
    pub async fn get_or_fetch<F, Fut>(&self, source: &str, fetch: F) -> PlotResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PlotResult<T>>,
    {
        if let Some(value) = self.get(source).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache = self.label, source, "Cache miss, fetching");
        let value = fetch().await?;
        Ok(self.insert(source, value).await)
    }

    pub async fn invalidate(&self, source: &str) {
        self.entries.write().await.remove(source);
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn stats(&self) -> &SourceCacheStats {
        &self.stats
    }
}

/// The caches the plotters share.
pub struct SourceCaches {
    pub ranks: SourceCache<Vec<Rank>>,
    pub channels: SourceCache<Vec<Channel>>,
}

impl SourceCaches {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ranks: SourceCache::new("ranks", ttl),
            channels: SourceCache::new("channels", ttl),
        }
    }
}
