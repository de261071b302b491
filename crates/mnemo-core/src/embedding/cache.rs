//! Bounded FIFO cache of text embeddings.
//!
//! Keyed by the exact text. Reads use `peek` so lookups never refresh an
//! entry; when full, the oldest inserted entry is evicted. The lock is never
//! held across an `.await`.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Process-local embedding cache shared by context pruning calls.
///
/// A capacity of zero disables caching.
pub struct EmbeddingCache {
    inner: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let cache = self.inner.as_ref()?.lock().ok()?;
        cache.peek(text).cloned()
    }

    pub fn insert(&self, text: String, embedding: Vec<f32>) {
        let Some(Ok(mut cache)) = self.inner.as_ref().map(Mutex::lock) else {
            return;
        };
        // Overwrite in place so a re-insert keeps its eviction slot.
        if let Some(existing) = cache.peek_mut(&text) {
            *existing = embedding;
            return;
        }
        cache.push(text, embedding);
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|m| m.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = EmbeddingCache::new(4);
        cache.insert("hello".to_string(), vec![1.0]);
        assert_eq!(cache.get("hello"), Some(vec![1.0]));
        assert_eq!(cache.get("world"), None);
    }

    #[test]
    fn test_cache_evicts_oldest_first() {
        let cache = EmbeddingCache::new(2);
        cache.insert("a".to_string(), vec![1.0]);
        cache.insert("b".to_string(), vec![2.0]);
        cache.insert("c".to_string(), vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c"), Some(vec![3.0]));
    }

    #[test]
    fn test_cache_reinsert_does_not_grow() {
        let cache = EmbeddingCache::new(2);
        cache.insert("a".to_string(), vec![1.0]);
        cache.insert("a".to_string(), vec![9.0]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(vec![9.0]));
    }

    #[test]
    fn test_lookup_does_not_refresh_eviction_order() {
        let cache = EmbeddingCache::new(2);
        cache.insert("a".to_string(), vec![1.0]);
        cache.insert("b".to_string(), vec![2.0]);
        assert!(cache.get("a").is_some());
        cache.insert("a".to_string(), vec![1.5]);
        cache.insert("c".to_string(), vec![3.0]);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(vec![2.0]));
        assert_eq!(cache.get("c"), Some(vec![3.0]));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = EmbeddingCache::new(0);
        cache.insert("a".to_string(), vec![1.0]);
        assert!(cache.is_empty());
    }
}
