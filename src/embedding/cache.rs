use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// LRU of query embeddings keyed by (model, exact text). A capacity of zero
/// disables caching.
pub struct EmbeddingCache {
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // Models are case-sensitive, so the text is hashed as-is.
    fn cache_key(text: &str, model_version: &str) -> String {
        let hash = blake3::hash(format!("{}\u{0}{}", model_version, text).as_bytes());
        hash.to_hex().to_string()
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<String, Vec<f32>>>> {
        self.cache
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn get(&self, text: &str, model_version: &str) -> Option<Vec<f32>> {
        let mut cache = self.lock()?;
        let key = Self::cache_key(text, model_version);
        if let Some(vec) = cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(vec.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn put(&self, text: &str, model_version: &str, embedding: Vec<f32>) {
        if let Some(mut cache) = self.lock() {
            cache.put(Self::cache_key(text, model_version), embedding);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.lock().map(|c| c.len()).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}
