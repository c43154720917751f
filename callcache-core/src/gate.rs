//! The invocation gate.
//!
//! Given a pool, a key and a computation, the gate returns the authoritative
//! value for the key, running the computation at most once per staleness
//! epoch no matter how many callers race on it:
//!
//! 1. look the entry up, creating it if needed
//! 2. fast path: serve a fresh value without touching the entry lock
//! 3. slow path: take the entry lock, check again (another caller may have
//!    refreshed the value while this one waited) and, if the value is still
//!    stale or missing, run the computation and store its result
//!
//! A computation that fails leaves the entry untouched: the error goes back to
//! the caller that ran it and the next caller of the same key retries. The
//! entry lock is a scoped guard, so it is released on every exit path,
//! including unwinding panics and dropped futures.
//!
//! Both execution modes run this exact sequence; they only differ in how the
//! entry lock is awaited and how the computation is invoked.

use std::convert::Infallible;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use crate::{Async, Blocking, CacheEntry, CachePool, ExecutionMode};

impl<K, V, M> CachePool<K, V, M>
where
    K: Eq + Hash,
    V: Clone,
    M: ExecutionMode,
{
    /// Step 2 and the re-check of step 3.
    fn serve_fresh(&self, entry: &CacheEntry<V, M>) -> Option<V> {
        let value = entry.fresh_value(&self.policy())?;
        self.record_hit();
        tracing::trace!(pool = %self.name(), "cache hit");
        Some(value)
    }

    /// Stores the outcome of a computation run under the entry lock.
    fn commit<E>(&self, entry: &CacheEntry<V, M>, outcome: Result<V, E>) -> Result<V, E> {
        match outcome {
            Ok(value) => {
                entry.store(value.clone(), &self.policy());
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                tracing::debug!(pool = %self.name(), "computation failed, entry left stale");
                Err(err)
            }
        }
    }

    fn begin_computation(&self) {
        self.record_miss();
        tracing::debug!(pool = %self.name(), policy = %self.policy(), "computing value");
    }
}

impl<K, V> CachePool<K, V, Blocking>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the cached value for `key`, running `compute` on the calling
    /// thread if the value is missing or stale.
    ///
    /// Concurrent callers of the same key block on the entry lock while one
    /// of them computes, then share its result.
    ///
    /// # Examples
    ///
    /// ```
    /// use callcache_core::{CachePool, ExpirationPolicy};
    ///
    /// let pool: CachePool<u64, u64> = CachePool::new(ExpirationPolicy::count(2));
    /// let mut runs = 0;
    /// for _ in 0..4 {
    ///     pool.get_or_compute(10, || { runs += 1; 10 * 10 });
    /// }
    /// assert_eq!(runs, 2);
    /// ```
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.get_or_try_compute(key, || Ok::<V, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible version of [`get_or_compute`](Self::get_or_compute).
    ///
    /// An `Err` returned by `compute` is handed back to this caller verbatim
    /// and never cached.
    ///
    /// # Examples
    ///
    /// ```
    /// use callcache_core::{CachePool, ExpirationPolicy};
    ///
    /// let pool: CachePool<&str, u16> = CachePool::new(ExpirationPolicy::forever());
    ///
    /// let first: Result<u16, String> = pool.get_or_try_compute("port", || Err("not ready".into()));
    /// assert!(first.is_err());
    ///
    /// let second: Result<u16, String> = pool.get_or_try_compute("port", || Ok(8080));
    /// assert_eq!(second, Ok(8080));
    /// ```
    pub fn get_or_try_compute<F, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let entry = self.get_or_create(key);
        if let Some(value) = self.serve_fresh(&entry) {
            return Ok(value);
        }

        let _guard = entry.lock.lock();
        if let Some(value) = self.serve_fresh(&entry) {
            return Ok(value);
        }

        self.begin_computation();
        self.commit(&entry, compute())
    }
}

impl<K, V> CachePool<K, V, Async>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the cached value for `key`, awaiting `compute` if the value is
    /// missing or stale.
    ///
    /// Concurrent tasks racing on the same key are suspended on the entry lock
    /// while one of them awaits the computation. Cache hits never suspend.
    ///
    /// If the returned future is dropped while the computation is pending, the
    /// entry lock is released and the entry stays stale.
    pub async fn get_or_compute_async<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let outcome = self
            .get_or_try_compute_async(key, move || async move {
                Ok::<V, Infallible>(compute().await)
            })
            .await;
        match outcome {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible version of [`get_or_compute_async`](Self::get_or_compute_async).
    pub async fn get_or_try_compute_async<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let entry: Arc<CacheEntry<V, Async>> = self.get_or_create(key);
        if let Some(value) = self.serve_fresh(&entry) {
            return Ok(value);
        }

        let _guard = entry.lock.lock().await;
        if let Some(value) = self.serve_fresh(&entry) {
            return Ok(value);
        }

        self.begin_computation();
        let outcome = compute().await;
        self.commit(&entry, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExpirationPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_hit_after_first_computation() {
        let pool: CachePool<u32, u32> = CachePool::new(ExpirationPolicy::Forever);
        let runs = AtomicUsize::new(0);
        let compute = || {
            runs.fetch_add(1, Ordering::SeqCst);
            7
        };
        assert_eq!(pool.get_or_compute(1, compute), 7);
        assert_eq!(pool.get_or_compute(1, compute), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let pool: CachePool<u32, u32> = CachePool::new(ExpirationPolicy::Forever);

        let failed: Result<u32, &str> = pool.get_or_try_compute(1, || Err("boom"));
        assert_eq!(failed, Err("boom"));
        assert!(!pool.get_or_create(1).is_computed());

        let ok: Result<u32, &str> = pool.get_or_try_compute(1, || Ok(3));
        assert_eq!(ok, Ok(3));
        let cached: Result<u32, &str> = pool.get_or_try_compute(1, || Err("not called"));
        assert_eq!(cached, Ok(3));
    }

    #[test]
    fn test_failed_refresh_keeps_stale_value_and_retries() {
        let pool: CachePool<u32, u32> = CachePool::new(ExpirationPolicy::Count(1));
        assert_eq!(pool.get_or_compute(1, || 10), 10);

        let failed: Result<u32, ()> = pool.get_or_try_compute(1, || Err(()));
        assert!(failed.is_err());
        assert_eq!(pool.get_or_create(1).value(), Some(10));

        let ok: Result<u32, ()> = pool.get_or_try_compute(1, || Ok(11));
        assert_eq!(ok, Ok(11));
    }

    #[test]
    fn test_panicking_computation_releases_entry_lock() {
        let pool: Arc<CachePool<u32, u32>> = Arc::new(CachePool::new(ExpirationPolicy::Forever));

        let panicking = Arc::clone(&pool);
        let result = thread::spawn(move || panicking.get_or_compute(1, || panic!("compute failed")))
            .join();
        assert!(result.is_err());

        assert_eq!(pool.get_or_compute(1, || 5), 5);
    }

    #[test]
    fn test_at_most_once_under_race() {
        let pool: Arc<CachePool<&'static str, usize>> =
            Arc::new(CachePool::new(ExpirationPolicy::Forever));
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(32));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    pool.get_or_compute("key", || {
                        thread::sleep(Duration::from_millis(30));
                        runs.fetch_add(1, Ordering::SeqCst)
                    })
                })
            })
            .collect();

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|&r| r == results[0]));
    }

    #[test]
    fn test_different_keys_do_not_wait_on_each_other() {
        let pool: Arc<CachePool<u32, u32>> = Arc::new(CachePool::new(ExpirationPolicy::Forever));

        let slow = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            slow.get_or_compute(1, || {
                thread::sleep(Duration::from_millis(300));
                1
            })
        });

        thread::sleep(Duration::from_millis(50));
        let started = std::time::Instant::now();
        assert_eq!(pool.get_or_compute(2, || 2), 2);
        assert!(started.elapsed() < Duration::from_millis(200));

        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_clear_during_computation() {
        let pool: Arc<CachePool<u32, u32>> = Arc::new(CachePool::new(ExpirationPolicy::Forever));
        let runs = Arc::new(AtomicUsize::new(0));
        let computing = Arc::new(Barrier::new(2));
        let cleared = Arc::new(Barrier::new(2));

        let handle = {
            let pool = Arc::clone(&pool);
            let runs = Arc::clone(&runs);
            let computing = Arc::clone(&computing);
            let cleared = Arc::clone(&cleared);
            thread::spawn(move || {
                pool.get_or_compute(1, || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    computing.wait();
                    cleared.wait();
                    10
                })
            })
        };

        computing.wait();
        pool.clear();
        cleared.wait();

        // The caller still gets its value, but the entry stays out of the pool.
        assert_eq!(handle.join().unwrap(), 10);
        assert!(!pool.contains_key(&1));
        assert!(pool.is_empty());

        assert_eq!(
            pool.get_or_compute(1, || {
                runs.fetch_add(1, Ordering::SeqCst);
                20
            }),
            20
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(pool.contains_key(&1));
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_stats_are_recorded() {
        let pool: CachePool<u32, u32> = CachePool::new(ExpirationPolicy::Forever);
        pool.get_or_compute(1, || 1);
        pool.get_or_compute(1, || 1);
        let _: Result<u32, ()> = pool.get_or_try_compute(2, || Err(()));

        assert_eq!(pool.stats().hits(), 1);
        assert_eq!(pool.stats().misses(), 2);
        assert_eq!(pool.stats().failures(), 1);
    }

    #[tokio::test]
    async fn test_async_gate_caches() {
        let pool: CachePool<u32, String, Async> = CachePool::new(ExpirationPolicy::Forever);
        let first = pool
            .get_or_compute_async(1, || async { "one".to_string() })
            .await;
        let second = pool
            .get_or_compute_async(1, || async { "recomputed".to_string() })
            .await;
        assert_eq!(first, "one");
        assert_eq!(second, "one");
    }

    #[tokio::test]
    async fn test_async_failure_is_not_cached() {
        let pool: CachePool<u32, u32, Async> = CachePool::new(ExpirationPolicy::Forever);
        let failed: Result<u32, String> = pool
            .get_or_try_compute_async(1, || async { Err("down".to_string()) })
            .await;
        assert!(failed.is_err());
        let ok: Result<u32, String> = pool.get_or_try_compute_async(1, || async { Ok(1) }).await;
        assert_eq!(ok, Ok(1));
    }

    #[tokio::test]
    async fn test_cancelled_computation_leaves_entry_stale() {
        let pool: Arc<CachePool<u32, u32, Async>> =
            Arc::new(CachePool::new(ExpirationPolicy::Forever));

        let pending = Arc::clone(&pool);
        let task = tokio::spawn(async move {
            pending
                .get_or_compute_async(1, || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    0
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();
        let _ = task.await;

        assert!(!pool.get_or_create(1).is_computed());
        let value = tokio::time::timeout(
            Duration::from_secs(1),
            pool.get_or_compute_async(1, || async { 9 }),
        )
        .await
        .expect("entry lock should have been released");
        assert_eq!(value, 9);
    }
}
