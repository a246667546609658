//! Query embedding cache
//!
//! Chat users repeat questions (suggested follow-ups are clicked verbatim),
//! so query vectors are kept in a bounded LRU cache in front of the
//! embedding API.
//!
//! # Cache Key Strategy
//!
//! Keys are SHA-256 hashes of `model | input_type | text`:
//! - different models produce different vectors
//! - query and document embeddings of the same text differ
//! - keys stay stable across restarts

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::rag::embeddings::InputType;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Bounded LRU cache of embedding vectors.
///
/// A capacity of zero disables the cache: `get` always misses and `put`
/// stores nothing.
pub struct QueryEmbeddingCache {
    entries: Option<Mutex<LruCache<String, Vec<f32>>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryEmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Compute the cache key for a text embedded by `model` as `input_type`
    pub fn compute_key(model: &str, input_type: InputType, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update(b"|");
        hasher.update(input_type.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let found = self
            .entries
            .as_ref()
            .and_then(|entries| entries.lock().get(key).cloned());

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn put(&self, key: String, embedding: Vec<f32>) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, embedding);
        }
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map(|entries| entries.lock().len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_computation() {
        let a = QueryEmbeddingCache::compute_key("voyage-3.5-lite", InputType::Query, "qubit");
        let b = QueryEmbeddingCache::compute_key("voyage-3.5-lite", InputType::Query, "qubit");
        let other_model = QueryEmbeddingCache::compute_key("voyage-3", InputType::Query, "qubit");
        let other_type =
            QueryEmbeddingCache::compute_key("voyage-3.5-lite", InputType::Document, "qubit");

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, other_model);
        assert_ne!(a, other_type);
    }

    #[test]
    fn test_cache_put_and_get() {
        let cache = QueryEmbeddingCache::new(4);
        cache.put("k".to_string(), vec![0.1, 0.2]);

        assert_eq!(cache.get("k"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get("missing"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let cache = QueryEmbeddingCache::new(2);
        cache.put("a".to_string(), vec![1.0]);
        cache.put("b".to_string(), vec![2.0]);
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.put("c".to_string(), vec![3.0]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_disabled() {
        let cache = QueryEmbeddingCache::disabled();
        cache.put("k".to_string(), vec![1.0]);

        assert!(!cache.is_enabled());
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear() {
        let cache = QueryEmbeddingCache::new(8);
        cache.put("a".to_string(), vec![1.0]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
