//! Bounded fetch-on-miss cache for compiled resources.
//!
//! [`ResourceCache`] memoizes the result of an async factory per string key.
//! Providers use it to compile each template once and hand out the same
//! `Arc<Engine>` on every later fetch.
//!
//! # Eviction
//!
//! The cache holds at most `limit` entries. Inserting a new key beyond the limit
//! evicts exactly one entry: the oldest-inserted one. Eviction order is insertion
//! order, not access order, so a hot key is still evicted once it is the oldest.
//! Entries live in a `HashMap` with a side `VecDeque` recording insertion order,
//! which keeps eviction deterministic and O(1).
//!
//! # Concurrent misses
//!
//! Concurrent first fetches of the same key share one factory call. The first
//! caller inserts a pending slot (a [`tokio::sync::OnceCell`]); later callers
//! await that slot instead of starting their own factory. If the factory fails
//! the slot is removed again so the next fetch retries from scratch.
//!
//! # Examples
//!
//! ```rust
//! use declkit::cache::ResourceCache;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache: ResourceCache<String> = ResourceCache::new(2);
//!
//! let value = cache.fetch("a", || async { Ok("compiled a".to_string()) }).await?;
//! assert_eq!(value, "compiled a");
//!
//! // Second fetch is served from the cache; the factory is not called.
//! let value = cache.fetch("a", || async { Ok("unused".to_string()) }).await?;
//! assert_eq!(value, "compiled a");
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

use crate::constants::DEFAULT_CACHE_LIMIT;
use crate::core::require_key;

/// A slot is pending until its factory completes, then holds the value.
type Slot<V> = Arc<OnceCell<V>>;

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, Slot<V>>,
    /// Keys in insertion order; the front is evicted first.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// Bounded, insertion-ordered memoization keyed by string.
///
/// `V` is cloned out on every hit, so it is usually an `Arc`.
#[derive(Debug)]
pub struct ResourceCache<V> {
    limit: usize,
    state: Mutex<CacheState<V>>,
}

impl<V> Default for ResourceCache<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LIMIT)
    }
}

impl<V> ResourceCache<V>
where
    V: Clone + Send + Sync,
{
    /// Create a cache holding at most `limit` entries (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Maximum number of entries held.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Return the cached value for `key`, running `factory` on a miss.
    ///
    /// # Errors
    ///
    /// - [`crate::core::DeclkitError::MissingArgument`] when `key` is empty
    /// - any error returned by `factory`; nothing is cached in that case
    pub async fn fetch<F, Fut>(&self, key: &str, factory: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        require_key("key", key)?;

        let slot = self.slot_for(key);
        match slot.get_or_try_init(factory).await {
            Ok(value) => Ok(value.clone()),
            Err(e) => {
                self.discard_if_unfilled(key, &slot);
                Err(e)
            }
        }
    }

    /// Look up or create the slot for `key`, evicting the oldest entry if needed.
    fn slot_for(&self, key: &str) -> Slot<V> {
        let mut state = self.lock();

        if let Some(slot) = state.entries.get(key) {
            let slot = Arc::clone(slot);
            if slot.initialized() {
                state.hits += 1;
                tracing::trace!(target: "cache", "hit: {}", key);
            } else {
                tracing::debug!(target: "cache", "joining in-flight fetch: {}", key);
            }
            return slot;
        }

        state.misses += 1;
        tracing::debug!(target: "cache", "miss: {}", key);

        while state.entries.len() >= self.limit {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            tracing::debug!(target: "cache", "evicted oldest entry: {}", oldest);
        }

        let slot: Slot<V> = Arc::new(OnceCell::new());
        state.entries.insert(key.to_string(), Arc::clone(&slot));
        state.order.push_back(key.to_string());
        slot
    }

    /// Drop a slot whose factory failed, unless it was replaced or filled meanwhile.
    fn discard_if_unfilled(&self, key: &str, slot: &Slot<V>) {
        let mut state = self.lock();
        let same_slot = state
            .entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if same_slot {
            state.entries.remove(key);
            state.order.retain(|k| k != key);
        }
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.lock();
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.order.retain(|k| k != key);
        }
        removed
    }

    /// Remove every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Whether `key` currently holds a completed value.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.get(key).is_some_and(|slot| slot.initialized())
    }

    /// Keys in insertion order, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    /// Number of entries, pending ones included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        let state = self.lock();
        (state.hits, state.misses)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeclkitError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_fetch_calls_factory_once() {
        let cache: ResourceCache<u32> = ResourceCache::new(10);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .fetch("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), (2, 1));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let cache: ResourceCache<u32> = ResourceCache::default();
        let err = cache.fetch("", || async { Ok(1) }).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeclkitError>(),
            Some(DeclkitError::MissingArgument { .. })
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_evicts_oldest_inserted() {
        let limit = 100;
        let cache: ResourceCache<usize> = ResourceCache::new(limit);

        for i in 0..=limit {
            let key = format!("key{i}");
            cache.fetch(&key, || async move { Ok(i) }).await.unwrap();
        }

        assert_eq!(cache.len(), limit);
        assert!(!cache.contains("key0"));
        assert!(cache.contains("key1"));
        assert!(cache.contains(&format!("key{limit}")));
    }

    #[tokio::test]
    async fn test_eviction_ignores_access_order() {
        let cache: ResourceCache<u32> = ResourceCache::new(2);
        cache.fetch("a", || async { Ok(1) }).await.unwrap();
        cache.fetch("b", || async { Ok(2) }).await.unwrap();
        // Touch "a" again; it is still the oldest insertion.
        cache.fetch("a", || async { Ok(99) }).await.unwrap();
        cache.fetch("c", || async { Ok(3) }).await.unwrap();

        assert_eq!(cache.keys(), vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_factory_is_not_cached() {
        let cache: ResourceCache<u32> = ResourceCache::new(4);

        let err = cache.fetch("k", || async { Err(anyhow::anyhow!("boom")) }).await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        let value = cache.fetch("k", || async { Ok(5) }).await.unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_factory() {
        let cache: Arc<ResourceCache<u32>> = Arc::new(ResourceCache::new(4));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch("shared", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache: ResourceCache<u32> = ResourceCache::new(4);
        cache.fetch("a", || async { Ok(1) }).await.unwrap();
        cache.fetch("b", || async { Ok(2) }).await.unwrap();

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.keys(), vec!["b".to_string()]);

        cache.clear();
        assert!(cache.is_empty());

        let value = cache.fetch("b", || async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
    }
}
