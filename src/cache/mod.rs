//! Kernel cache implementation
//!
//! LRU cache for kernel matrix values shared by one SMO run. Kernel matrices
//! are symmetric, so K(i,j) and K(j,i) share a single entry.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key for kernel values, normalized so that i <= j
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    i: usize,
    j: usize,
}

impl CacheKey {
    fn new(i: usize, j: usize) -> Self {
        if i <= j {
            Self { i, j }
        } else {
            Self { i: j, j: i }
        }
    }
}

/// LRU cache for kernel matrix values
pub struct KernelCache {
    cache: LruCache<CacheKey, f64>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a kernel cache sized from a memory budget in bytes
    /// (16 bytes per entry: key + value + overhead)
    pub fn with_memory_limit(memory_bytes: usize) -> Self {
        Self::new(memory_bytes / 16)
    }

    /// Get a kernel value from cache
    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        let key = CacheKey::new(i, j);
        if let Some(&value) = self.cache.get(&key) {
            self.hits += 1;
            Some(value)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Put a kernel value into cache
    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        self.cache.put(CacheKey::new(i, j), value);
    }

    /// Return the cached value or compute, store and return it
    pub fn get_or_compute<F: FnOnce() -> f64>(&mut self, i: usize, j: usize, compute: F) -> f64 {
        if let Some(value) = self.get(i, j) {
            return value;
        }
        let value = compute();
        self.put(i, j, value);
        value
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(CacheKey::new(1, 5), CacheKey::new(5, 1));
    }

    #[test]
    fn test_kernel_cache_symmetric_access() {
        let mut cache = KernelCache::new(3);

        assert_eq!(cache.get(0, 1), None);
        cache.put(0, 1, 5.0);
        assert_eq!(cache.get(1, 0), Some(5.0));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_get_or_compute_only_computes_once() {
        let mut cache = KernelCache::new(4);
        let mut calls = 0;

        let first = cache.get_or_compute(2, 3, || {
            calls += 1;
            0.75
        });
        let second = cache.get_or_compute(3, 2, || {
            calls += 1;
            0.0
        });

        assert_eq!(first, 0.75);
        assert_eq!(second, 0.75);
        assert_eq!(calls, 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_kernel_cache_lru_eviction() {
        let mut cache = KernelCache::new(2);

        cache.put(0, 1, 1.0);
        cache.put(1, 2, 2.0);
        cache.put(2, 3, 3.0);

        assert_eq!(cache.get(0, 1), None);
        assert_eq!(cache.get(2, 3), Some(3.0));
    }

    #[test]
    fn test_cache_with_memory_limit_and_clear() {
        let mut cache = KernelCache::with_memory_limit(8);
        assert_eq!(cache.stats().capacity, 1);

        cache.put(0, 0, 1.0);
        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().hits, 0);
    }
}
