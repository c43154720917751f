use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;

#[cfg(feature = "stats")]
use crate::CacheStats;
use crate::{Blocking, CacheEntry, ExecutionMode, ExpirationPolicy};

/// Name given to pools created without one.
pub const ANONYMOUS_POOL: &str = "<anonymous>";

/// A keyed store of memoized invocations.
///
/// A pool maps an invocation key to a [`CacheEntry`] and applies a single
/// [`ExpirationPolicy`] to all of them. There is one pool per cached function,
/// or one per object instance (optionally shared across all instances of a
/// type, see [`TypeCache`](crate::TypeCache)).
///
/// # Type Parameters
///
/// * `K` - The invocation key
/// * `V` - The memoized value
/// * `M` - The [`ExecutionMode`] of the gate, [`Blocking`] or [`Async`](crate::Async)
///
/// # Locking
///
/// Locking is two-level:
///
/// - the **pool lock** (the write side of the map's `RwLock`) is only taken
///   to insert a brand-new entry, so contention on it is limited to a map insert
/// - each entry owns an **entry lock**, held for the whole duration of the
///   wrapped call, so that callers of different keys never wait on each other
///
/// Lookups of existing entries only take the read side of the map lock.
///
/// # Examples
///
/// ```
/// use callcache_core::{CachePool, ExpirationPolicy};
///
/// let pool: CachePool<(u32, u32), u32> = CachePool::named("add", ExpirationPolicy::forever());
///
/// assert_eq!(pool.get_or_compute((1, 2), || 1 + 2), 3);
/// // Served from the pool, the closure is not invoked
/// assert_eq!(pool.get_or_compute((1, 2), || unreachable!()), 3);
/// assert_eq!(pool.len(), 1);
///
/// pool.clear();
/// assert!(pool.is_empty());
/// ```
pub struct CachePool<K, V, M: ExecutionMode = Blocking> {
    name: String,
    policy: ExpirationPolicy,
    entries: RwLock<HashMap<K, Arc<CacheEntry<V, M>>>>,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl<K, V, M: ExecutionMode> CachePool<K, V, M> {
    /// Creates an anonymous pool.
    pub fn new(policy: ExpirationPolicy) -> Self {
        Self::named(ANONYMOUS_POOL, policy)
    }

    /// Creates a pool with a name used in logs, the statistics registry and
    /// by [`clear_cache`](crate::clear_cache).
    pub fn named(name: impl Into<String>, policy: ExpirationPolicy) -> Self {
        let name = name.into();
        tracing::debug!(pool = %name, %policy, "creating cache pool");
        Self {
            name,
            policy,
            entries: RwLock::new(HashMap::new()),
            #[cfg(feature = "stats")]
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Creates a named pool recording into counters owned by someone else.
    #[cfg(feature = "stats")]
    pub(crate) fn with_stats(
        name: impl Into<String>,
        policy: ExpirationPolicy,
        stats: Arc<CacheStats>,
    ) -> Self {
        Self {
            stats,
            ..Self::named(name, policy)
        }
    }

    /// Returns the pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the expiration policy applied to every entry.
    pub fn policy(&self) -> ExpirationPolicy {
        self.policy
    }

    /// Returns the number of entries, computed or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the pool holds no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Discards every entry.
    ///
    /// The entry map is swapped for an empty one in a single step. A
    /// computation already running for a discarded entry still completes and
    /// is returned to its caller, but its result lands in the discarded entry
    /// and is never visible through the pool.
    pub fn clear(&self) {
        let discarded = mem::take(&mut *self.entries.write());
        tracing::debug!(pool = %self.name, entries = discarded.len(), "cleared cache pool");
        drop(discarded);
    }

    /// Hit and miss counters of this pool.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    #[cfg(feature = "stats")]
    pub(crate) fn shared_stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub(crate) fn record_hit(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_hit();
    }

    pub(crate) fn record_miss(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_miss();
    }

    pub(crate) fn record_failure(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_failure();
    }
}

impl<K: Eq + Hash, V, M: ExecutionMode> CachePool<K, V, M> {
    /// Returns the entry for `key`, creating an empty one if needed.
    ///
    /// Existing entries are found under the read lock. On a miss the pool lock
    /// is taken and the map checked again, so that racing creators of the
    /// same key end up sharing a single entry.
    pub fn get_or_create(&self, key: K) -> Arc<CacheEntry<V, M>> {
        if let Some(entry) = self.entries.read().get(&key) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(key)
                .or_insert_with(|| Arc::new(CacheEntry::new())),
        )
    }

    /// Returns the entry for `key` without creating it.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<CacheEntry<V, M>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().get(key).map(Arc::clone)
    }

    /// Returns `true` if an entry exists for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    /// Discards the entry for `key`, returning `true` if there was one.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key).is_some()
    }
}

impl<K, V, M: ExecutionMode> fmt::Debug for CachePool<K, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePool")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_get_or_create_returns_same_entry() {
        let pool: CachePool<&str, i32> = CachePool::new(ExpirationPolicy::Forever);
        let first = pool.get_or_create("a");
        let second = pool.get_or_create("a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.name(), ANONYMOUS_POOL);
    }

    #[test]
    fn test_racing_creators_share_one_entry() {
        let pool: Arc<CachePool<u64, u64>> = Arc::new(CachePool::new(ExpirationPolicy::Forever));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    pool.get_or_create(99)
                })
            })
            .collect();

        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_clear_detaches_existing_entries() {
        let pool: CachePool<u8, u8> = CachePool::new(ExpirationPolicy::Forever);
        let old = pool.get_or_create(1);
        pool.clear();
        assert!(pool.is_empty());
        assert!(!pool.contains_key(&1));

        // Writing into a discarded entry does not resurrect it.
        old.store(5, &pool.policy());
        assert!(!pool.contains_key(&1));
        let fresh = pool.get_or_create(1);
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!fresh.is_computed());
    }

    #[test]
    fn test_get_and_remove() {
        let pool: CachePool<String, u8> = CachePool::named("names", ExpirationPolicy::Forever);
        assert!(pool.get("x").is_none());
        pool.get_or_create("x".to_string());
        assert!(pool.get("x").is_some());
        assert!(pool.remove("x"));
        assert!(!pool.remove("x"));
        assert_eq!(pool.name(), "names");
    }
}
