use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use crate::registry::CacheRegistry;
use crate::{Async, Blocking, CachePool, ExpirationPolicy, ANONYMOUS_POOL};

/// A callable wrapped with its own memoization pool.
///
/// The wrapper is keyed directly on the argument value (use a tuple for
/// several arguments) and owns its pool; dropping the wrapper drops the pool.
/// Clones share the pool.
///
/// # Examples
///
/// ```
/// use callcache_core::{wrap, ExpirationPolicy};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// static RUNS: AtomicUsize = AtomicUsize::new(0);
///
/// let add = wrap(
///     |(a, b): (i64, i64)| {
///         RUNS.fetch_add(1, Ordering::SeqCst);
///         a + b
///     },
///     ExpirationPolicy::forever(),
/// );
///
/// assert_eq!(add.call((2, 3)), 5);
/// assert_eq!(add.call((2, 3)), 5);
/// assert_eq!(RUNS.load(Ordering::SeqCst), 1);
///
/// add.clear();
/// assert_eq!(add.call((2, 3)), 5);
/// assert_eq!(RUNS.load(Ordering::SeqCst), 2);
/// ```
pub struct CachedFn<A, V, F> {
    func: F,
    pool: Arc<CachePool<A, V, Blocking>>,
}

/// Wraps `func` in an anonymous [`CachedFn`].
pub fn wrap<A, V, F>(func: F, policy: ExpirationPolicy) -> CachedFn<A, V, F> {
    CachedFn::new(func, policy)
}

impl<A, V, F> CachedFn<A, V, F> {
    pub fn new(func: F, policy: ExpirationPolicy) -> Self {
        Self {
            func,
            pool: Arc::new(CachePool::named(ANONYMOUS_POOL, policy)),
        }
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.pool.policy()
    }

    /// The pool backing this wrapper.
    pub fn pool(&self) -> &CachePool<A, V, Blocking> {
        &self.pool
    }

    /// Discards every memoized invocation.
    pub fn clear(&self) {
        self.pool.clear();
    }
}

impl<A, V, F> CachedFn<A, V, F>
where
    A: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Gives the wrapper a name and registers it, so that
    /// [`clear_cache`](crate::clear_cache) can reach it.
    ///
    /// Memoized values are not carried over.
    pub fn named(self, name: &str) -> Self {
        let pool = Arc::new(CachePool::named(name, self.pool.policy()));
        CacheRegistry::global().register_shared(&pool);
        Self {
            func: self.func,
            pool,
        }
    }

    /// Returns the memoized result of `func(args)`, computing it if missing or
    /// stale.
    pub fn call(&self, args: A) -> V
    where
        F: Fn(A) -> V,
    {
        self.pool
            .get_or_compute(args.clone(), || (self.func)(args))
    }

    /// Like [`call`](Self::call) for fallible callables. Errors are returned
    /// as is and never memoized.
    pub fn try_call<E>(&self, args: A) -> Result<V, E>
    where
        F: Fn(A) -> Result<V, E>,
    {
        self.pool
            .get_or_try_compute(args.clone(), || (self.func)(args))
    }
}

impl<A, V, F: Clone> Clone for CachedFn<A, V, F> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<A, V, F> fmt::Debug for CachedFn<A, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFn").field("pool", &self.pool).finish()
    }
}

/// The async counterpart of [`CachedFn`]: `func` returns a future and
/// concurrent callers of the same arguments are suspended, not blocked, while
/// it is awaited.
///
/// # Examples
///
/// ```
/// use callcache_core::{wrap_async, ExpirationPolicy};
///
/// # block_on(async {
/// let greet = wrap_async(
///     |name: String| async move { format!("hello {name}") },
///     ExpirationPolicy::count(10),
/// );
/// assert_eq!(greet.call("ada".to_string()).await, "hello ada");
/// # });
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct AsyncCachedFn<A, V, F> {
    func: F,
    pool: Arc<CachePool<A, V, Async>>,
}

/// Wraps the async callable `func` in an anonymous [`AsyncCachedFn`].
pub fn wrap_async<A, V, F>(func: F, policy: ExpirationPolicy) -> AsyncCachedFn<A, V, F> {
    AsyncCachedFn::new(func, policy)
}

impl<A, V, F> AsyncCachedFn<A, V, F> {
    pub fn new(func: F, policy: ExpirationPolicy) -> Self {
        Self {
            func,
            pool: Arc::new(CachePool::named(ANONYMOUS_POOL, policy)),
        }
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.pool.policy()
    }

    pub fn pool(&self) -> &CachePool<A, V, Async> {
        &self.pool
    }

    pub fn clear(&self) {
        self.pool.clear();
    }
}

impl<A, V, F> AsyncCachedFn<A, V, F>
where
    A: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// See [`CachedFn::named`].
    pub fn named(self, name: &str) -> Self {
        let pool = Arc::new(CachePool::named(name, self.pool.policy()));
        CacheRegistry::global().register_shared(&pool);
        Self {
            func: self.func,
            pool,
        }
    }

    pub async fn call<Fut>(&self, args: A) -> V
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = V>,
    {
        self.pool
            .get_or_compute_async(args.clone(), || (self.func)(args))
            .await
    }

    pub async fn try_call<E, Fut>(&self, args: A) -> Result<V, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.pool
            .get_or_try_compute_async(args.clone(), || (self.func)(args))
            .await
    }
}

impl<A, V, F: Clone> Clone for AsyncCachedFn<A, V, F> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<A, V, F> fmt::Debug for AsyncCachedFn<A, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCachedFn")
            .field("pool", &self.pool)
            .finish()
    }
}
