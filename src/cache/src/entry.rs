/// Cache entry and statistics types
///
/// Entries are immutable once created; a rebuild replaces the entry
/// wholesale rather than patching it.
use std::time::{Duration, Instant};

/// Built value with the time it was published and its time-to-live
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Cached value
    value: T,
    /// Timestamp when the value finished building
    built_at: Instant,
    /// Time-to-live duration
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Creates a new cache entry stamped with the current time
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            built_at: Instant::now(),
            ttl,
        }
    }

    /// Checks if this cache entry is expired
    pub fn is_expired(&self) -> bool {
        self.built_at.elapsed() > self.ttl
    }

    /// Returns the cached value regardless of expiry
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Time elapsed since the value was built
    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a ready, non-expired entry
    pub hits: usize,
    /// Lookups that had to build or wait for a build
    pub misses: usize,
    /// Number of times a builder was actually invoked
    pub builds: usize,
    /// Builder invocations that returned an error
    pub build_failures: usize,
    /// Ready entries found past their TTL
    pub expirations: usize,
    /// Ready entries currently held
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
