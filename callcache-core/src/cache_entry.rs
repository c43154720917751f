use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::ExpirationPolicy;

/// How the invocation gate waits for an entry lock and runs the computation.
///
/// Pools and entries are parameterized by a mode rather than duplicated: both
/// modes share the same map, entry state and staleness checks and differ only
/// in the type of the per-entry lock.
pub trait ExecutionMode: sealed::Sealed + Send + Sync + 'static {
    /// The per-entry lock held for the duration of a (re)computation.
    type Lock: Default + Send + Sync;
}

/// Blocking mode: the computation runs on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

/// Async mode: the computation is awaited and waiting callers are suspended.
#[derive(Debug, Clone, Copy, Default)]
pub struct Async;

impl ExecutionMode for Blocking {
    type Lock = parking_lot::Mutex<()>;
}

impl ExecutionMode for Async {
    type Lock = tokio::sync::Mutex<()>;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Blocking {}
    impl Sealed for super::Async {}
}

/// Mutable part of an entry, always read and written under the entry's state lock.
#[derive(Debug)]
pub(crate) struct EntryState<V> {
    /// `Some` once the first computation succeeded.
    pub(crate) value: Option<V>,
    /// Expiration deadline under the TTL policy. `None` never expires.
    pub(crate) deadline: Option<Instant>,
    /// Calls served from the current value under the count policy.
    pub(crate) calls: AtomicU64,
}

impl<V> Default for EntryState<V> {
    fn default() -> Self {
        Self {
            value: None,
            deadline: None,
            calls: AtomicU64::new(0),
        }
    }
}

/// A single memoized invocation.
///
/// An entry is created on the first lookup of its key and then mutated in
/// place on every recomputation. It holds two locks:
///
/// * a short-lived state lock guarding the value and its staleness marker, so
///   that readers never observe a half-written entry
/// * the entry lock (see [`ExecutionMode`]) held by the single caller that is
///   (re)computing the value
///
/// # Type Parameters
///
/// * `V` - The type of the cached value
/// * `M` - The execution mode of the pool owning the entry
///
/// # Examples
///
/// ```
/// use callcache_core::{CachePool, ExpirationPolicy};
///
/// let pool: CachePool<u32, String> = CachePool::new(ExpirationPolicy::count(2));
/// let entry = pool.get_or_create(7);
/// assert!(!entry.is_computed());
///
/// pool.get_or_compute(7, || "seven".to_string());
/// assert!(entry.is_computed());
/// assert_eq!(entry.value(), Some("seven".to_string()));
/// assert_eq!(entry.calls(), 1);
/// ```
pub struct CacheEntry<V, M: ExecutionMode = crate::Blocking> {
    state: RwLock<EntryState<V>>,
    pub(crate) lock: M::Lock,
}

impl<V, M: ExecutionMode> CacheEntry<V, M> {
    /// Creates an empty, never computed entry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EntryState::default()),
            lock: M::Lock::default(),
        }
    }

    /// Returns `true` once a computation for this entry has succeeded.
    pub fn is_computed(&self) -> bool {
        self.state.read().value.is_some()
    }

    /// Returns the TTL deadline of the current value, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.state.read().deadline
    }

    /// Returns how many calls the current value has served under the count policy.
    pub fn calls(&self) -> u64 {
        self.state.read().calls.load(Ordering::Acquire)
    }

    /// Returns the cached value if the policy allows serving it for this access.
    ///
    /// This is the lock-free (with respect to the entry lock) check shared by
    /// both execution modes.
    pub(crate) fn fresh_value(&self, policy: &ExpirationPolicy) -> Option<V>
    where
        V: Clone,
    {
        let state = self.state.read();
        if policy.try_hit(&state) {
            state.value.clone()
        } else {
            None
        }
    }

    /// Stores a freshly computed value and starts a new staleness epoch.
    ///
    /// Must only be called by the holder of the entry lock.
    pub(crate) fn store(&self, value: V, policy: &ExpirationPolicy) {
        let mut state = self.state.write();
        state.value = Some(value);
        policy.refresh(&mut state);
    }
}

impl<V: Clone, M: ExecutionMode> CacheEntry<V, M> {
    /// Returns a copy of the last computed value, stale or not.
    pub fn value(&self) -> Option<V> {
        self.state.read().value.clone()
    }
}

impl<V, M: ExecutionMode> Default for CacheEntry<V, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Blocking;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_entry_not_computed() {
        let entry = CacheEntry::<i32, Blocking>::new();
        assert!(!entry.is_computed());
        assert_eq!(entry.value(), None);
        assert_eq!(entry.deadline(), None);
        assert!(entry.fresh_value(&ExpirationPolicy::Forever).is_none());
    }

    #[test]
    fn test_store_marks_computed() {
        let entry = CacheEntry::<i32, Blocking>::new();
        entry.store(42, &ExpirationPolicy::Forever);
        assert!(entry.is_computed());
        assert_eq!(entry.fresh_value(&ExpirationPolicy::Forever), Some(42));
    }

    #[test]
    fn test_ttl_entry_goes_stale_but_keeps_value() {
        let policy = ExpirationPolicy::ttl(Duration::from_millis(30));
        let entry = CacheEntry::<&str, Blocking>::new();
        entry.store("data", &policy);
        assert!(entry.deadline().is_some());
        assert_eq!(entry.fresh_value(&policy), Some("data"));

        thread::sleep(Duration::from_millis(60));
        assert_eq!(entry.fresh_value(&policy), None);
        // The stale value stays until it is replaced.
        assert_eq!(entry.value(), Some("data"));
    }

    #[test]
    fn test_count_entry_tracks_calls() {
        let policy = ExpirationPolicy::Count(3);
        let entry = CacheEntry::<u8, Blocking>::new();
        entry.store(1, &policy);
        assert_eq!(entry.calls(), 1);
        assert_eq!(entry.fresh_value(&policy), Some(1));
        assert_eq!(entry.calls(), 2);
        assert_eq!(entry.fresh_value(&policy), Some(1));
        assert_eq!(entry.fresh_value(&policy), None);
        assert_eq!(entry.calls(), 3);
    }
}
