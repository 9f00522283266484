//! Content-addressed LRU cache for embedding vectors.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Memoizes embedding vectors keyed by content hash.
///
/// Content addressing makes entries permanently valid, so there is no
/// expiry; eviction is purely capacity-driven, least-recently-used first.
/// Concurrent workers that race on the same miss simply compute the
/// embedding twice; the cache favors availability over deduplicating work.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Create a cache holding up to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a cached vector, marking the entry as recently used.
    pub fn get(&self, content_hash: &str) -> Option<Vec<f32>> {
        let mut cache = self.inner.lock().expect("embedding cache lock poisoned");
        cache.get(content_hash).cloned()
    }

    /// Store a vector, evicting the least-recently-used entry when full.
    pub fn put(&self, content_hash: &str, embedding: Vec<f32>) {
        let mut cache = self.inner.lock().expect("embedding cache lock poisoned");
        cache.put(content_hash.to_string(), embedding);
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("embedding cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured entry capacity.
    pub fn capacity(&self) -> usize {
        self.inner
            .lock()
            .expect("embedding cache lock poisoned")
            .cap()
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_what_was_put() {
        let cache = EmbeddingCache::new(10);
        assert!(cache.get("h1").is_none());

        cache.put("h1", vec![0.1, 0.2]);
        assert_eq!(cache.get("h1"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get("h1"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_only_beyond_capacity_and_lru_first() {
        let cache = EmbeddingCache::new(2);
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);
        assert_eq!(cache.len(), 2);

        // Touch "a" so "b" becomes the least recently used entry.
        assert!(cache.get("a").is_some());
        cache.put("c", vec![3.0]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = EmbeddingCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put("a", vec![1.0]);
        assert_eq!(cache.get("a"), Some(vec![1.0]));
    }
}
