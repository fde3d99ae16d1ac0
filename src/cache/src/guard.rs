/// Single-flight cache with per-key build exclusion
///
/// Each key owns a slot holding a `OnceCell`. An empty cell is the
/// in-flight promise for that key: the first caller runs the builder, every
/// other caller awaits the same cell and receives the published value.
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheStats};

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    builds: AtomicUsize,
    build_failures: AtomicUsize,
    expirations: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Build-once cache keyed by `K`, holding immutable values of type `V`
///
/// State per key: `Empty → Building → Ready`, back to `Empty` once the
/// entry's TTL elapses or the key is invalidated.
///
/// - Ready entries are returned without any exclusion
/// - At most one builder runs per key at a time
/// - Builders for different keys never wait on each other
/// - A failed build is not cached; the next caller builds again
///
/// `V` is cloned out to every caller, so it should be cheap to clone
/// (typically an `Arc` around the built snapshot).
///
/// A builder must not call `get_or_build` for its own key.
pub struct CacheGuard<K, V> {
    slots: DashMap<K, Slot<V>>,
    counters: Counters,
}

impl<K, V> CacheGuard<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Returns the cached value for `key`, building it with `build` if the
    /// key is empty or expired.
    ///
    /// Concurrent callers for the same key await the one in-flight build.
    /// If the builder fails, its error is returned to the caller that ran
    /// it and the slot stays empty; a caller still waiting on that slot
    /// then runs its own builder. The last caller to leave an empty slot
    /// removes it from the map.
    pub async fn get_or_build<F, Fut, E>(&self, key: &K, ttl: Duration, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = loop {
            let slot = self.slot(key);
            if let Some(entry) = slot.get() {
                if !entry.is_expired() {
                    Counters::bump(&self.counters.hits);
                    return Ok(entry.value().clone());
                }
                Counters::bump(&self.counters.expirations);
                debug!(?key, age = ?entry.age(), "cache entry expired");
                self.retire(key, &slot);
                continue;
            }
            break slot;
        };

        Counters::bump(&self.counters.misses);

        let built = slot
            .get_or_try_init(|| async {
                Counters::bump(&self.counters.builds);
                let started = Instant::now();
                match build().await {
                    Ok(value) => {
                        debug!(?key, elapsed = ?started.elapsed(), "cache entry built");
                        Ok(CacheEntry::new(value, ttl))
                    }
                    Err(err) => {
                        Counters::bump(&self.counters.build_failures);
                        warn!(?key, elapsed = ?started.elapsed(), "cache build failed");
                        Err(err)
                    }
                }
            })
            .await;

        match built {
            Ok(entry) => Ok(entry.value().clone()),
            Err(err) => {
                self.discard_failed(key, &slot);
                Err(err)
            }
        }
    }

    /// Returns the value for `key` only if it is ready and not expired
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = Arc::clone(self.slots.get(key)?.value());
        let entry = slot.get()?;
        if entry.is_expired() {
            None
        } else {
            Some(entry.value().clone())
        }
    }

    /// Drops the ready entry for `key` so the next caller rebuilds.
    ///
    /// A build in flight is left in place: its result is newer than the
    /// invalidation and every caller keeps awaiting that one builder.
    /// Returns true if a ready entry was dropped.
    pub fn invalidate(&self, key: &K) -> bool {
        self.slots
            .remove_if(key, |_, slot| slot.initialized())
            .is_some()
    }

    /// Removes every ready entry whose TTL has elapsed, and empty slots
    /// no caller is waiting on
    pub fn purge_expired(&self) {
        self.slots.retain(|_, slot| match slot.get() {
            Some(entry) => !entry.is_expired(),
            None => Arc::strong_count(slot) > 1,
        });
    }

    /// Drops every ready entry; builds in flight are kept
    pub fn clear(&self) {
        self.slots.retain(|_, slot| !slot.initialized());
    }

    /// Number of ready entries (expired ones included until purged)
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            build_failures: self.counters.build_failures.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Current slot for `key`, creating an empty one if absent.
    ///
    /// The map guard is released before returning so it is never held
    /// across an await point.
    fn slot(&self, key: &K) -> Slot<V> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()));
        Arc::clone(slot.value())
    }

    /// Replaces `slot` only if it is still the published slot for `key`
    fn retire(&self, key: &K, slot: &Slot<V>) {
        self.slots
            .remove_if(key, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Removes `slot` after a failed build once no other caller holds it.
    ///
    /// Callers clone slots out of the map under the shard lock, so with the
    /// lock held a count of two (map and `slot`) means nobody else waits.
    fn discard_failed(&self, key: &K, slot: &Slot<V>) {
        self.slots.remove_if(key, |_, current| {
            Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(current) == 2
        });
    }
}

impl<K, V> Default for CacheGuard<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
