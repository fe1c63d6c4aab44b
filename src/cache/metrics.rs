use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks hit/miss counts and decode cost of the model cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    decode_times: RwLock<HashMap<String, Duration>>,
    decode_counts: RwLock<HashMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    joined_loads: AtomicU64,
    total_memory: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished decode of `path`
    pub fn record_decode(&self, path: &str, duration: Duration, bytes: usize) {
        self.decode_times.write().insert(path.to_string(), duration);
        *self
            .decode_counts
            .write()
            .entry(path.to_string())
            .or_insert(0) += 1;
        self.total_memory.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a miss that joined a load already in flight
    pub fn record_joined_load(&self) {
        self.joined_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn joined_loads(&self) -> u64 {
        self.joined_loads.load(Ordering::Relaxed)
    }

    /// Get the cache hit rate as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let hits = self.cache_hits() as f32;
        let misses = self.cache_misses() as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    /// Estimated bytes held by decoded models
    pub fn total_memory_usage(&self) -> u64 {
        self.total_memory.load(Ordering::Relaxed)
    }

    /// Duration of the last decode of `path`
    pub fn decode_time(&self, path: &str) -> Option<Duration> {
        self.decode_times.read().get(path).copied()
    }

    /// Number of completed decodes of `path`
    pub fn decode_count(&self, path: &str) -> u64 {
        *self.decode_counts.read().get(path).unwrap_or(&0)
    }

    /// Completed decodes across all paths
    pub fn total_decodes(&self) -> u64 {
        self.decode_counts.read().values().sum()
    }
}

/// A thread-safe wrapper around CacheMetrics
#[derive(Debug, Clone, Default)]
pub struct CacheMetricsHandle(Arc<CacheMetrics>);

impl CacheMetricsHandle {
    pub fn new() -> Self {
        Self(Arc::new(CacheMetrics::new()))
    }
}

impl std::ops::Deref for CacheMetricsHandle {
    type Target = CacheMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        metrics.record_cache_miss();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        assert_eq!(metrics.cache_hit_rate(), 75.0);
    }

    #[test]
    fn test_decode_counts_per_path() {
        let metrics = CacheMetrics::new();
        metrics.record_decode("a.obj", Duration::from_millis(5), 100);
        metrics.record_decode("a.obj", Duration::from_millis(7), 100);
        metrics.record_decode("b.glb", Duration::from_millis(1), 50);

        assert_eq!(metrics.decode_count("a.obj"), 2);
        assert_eq!(metrics.decode_time("a.obj"), Some(Duration::from_millis(7)));
        assert_eq!(metrics.total_decodes(), 3);
        assert_eq!(metrics.total_memory_usage(), 250);
    }
}
