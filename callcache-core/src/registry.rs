//! Named caches that can be cleared from anywhere.
//!
//! Every pool created by the `#[cached]` macros, by a named wrapper or by a
//! shared [`TypeCache`](crate::TypeCache) registers a clear callback here
//! under its name. [`clear_cache`] then empties a cache knowing only its
//! name.
//!
//! # Examples
//!
//! ```
//! use callcache_core::registry::CacheRegistry;
//! use callcache_core::{clear_cache, CacheError};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let cleared = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&cleared);
//! CacheRegistry::global().register_callback("registry_doc_example", move || {
//!     flag.store(true, Ordering::SeqCst);
//! });
//!
//! clear_cache("registry_doc_example").unwrap();
//! assert!(cleared.load(Ordering::SeqCst));
//!
//! assert_eq!(
//!     clear_cache("never_registered"),
//!     Err(CacheError::NotCached("never_registered".to_string()))
//! );
//! ```

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use crate::{CacheError, CachePool, ExecutionMode};

type ClearCallback = Arc<dyn Fn() + Send + Sync>;

/// Registry of clear callbacks, indexed by cache name.
///
/// Registering a name twice replaces the previous callback.
pub struct CacheRegistry {
    clear_callbacks: DashMap<String, ClearCallback>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            clear_callbacks: DashMap::new(),
        }
    }

    /// The process-wide registry used by the macros and [`clear_cache`].
    pub fn global() -> &'static CacheRegistry {
        static INSTANCE: OnceLock<CacheRegistry> = OnceLock::new();
        INSTANCE.get_or_init(CacheRegistry::new)
    }

    /// Registers the callback invoked when the cache `name` is cleared.
    pub fn register_callback<F>(&self, name: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        tracing::debug!(cache = name, "registering cache");
        self.clear_callbacks
            .insert(name.to_string(), Arc::new(callback));
    }

    /// Registers a pool that lives for the rest of the program, typically the
    /// static pool generated for a cached function.
    pub fn register_pool<K, V, M>(&self, pool: &'static CachePool<K, V, M>)
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
        M: ExecutionMode,
    {
        #[cfg(feature = "stats")]
        crate::stats_registry::register(pool.name(), pool.shared_stats());
        self.register_callback(pool.name(), move || pool.clear());
    }

    /// Registers a reference-counted pool without keeping it alive.
    ///
    /// Once the pool is dropped, clearing its name is a no-op.
    pub fn register_shared<K, V, M>(&self, pool: &Arc<CachePool<K, V, M>>)
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
        M: ExecutionMode,
    {
        #[cfg(feature = "stats")]
        crate::stats_registry::register(pool.name(), pool.shared_stats());
        let weak = Arc::downgrade(pool);
        self.register_callback(pool.name(), move || {
            if let Some(pool) = weak.upgrade() {
                pool.clear();
            }
        });
    }

    /// Removes the registration of `name`, returning `true` if there was one.
    pub fn unregister(&self, name: &str) -> bool {
        #[cfg(feature = "stats")]
        crate::stats_registry::unregister(name);
        self.clear_callbacks.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clear_callbacks.contains_key(name)
    }

    /// Returns the names of all registered caches, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .clear_callbacks
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Empties the cache registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if nothing is registered under `name`.
    pub fn clear(&self, name: &str) -> Result<(), CacheError> {
        // The shard guard is released before running the callback.
        let callback = self
            .clear_callbacks
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CacheError::NotCached(name.to_string()))?;
        callback();
        tracing::debug!(cache = name, "cache cleared by name");
        Ok(())
    }

    /// Empties every registered cache and returns how many there were.
    pub fn clear_all(&self) -> usize {
        let callbacks: Vec<ClearCallback> = self
            .clear_callbacks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for callback in &callbacks {
            callback();
        }
        tracing::debug!(caches = callbacks.len(), "all caches cleared");
        callbacks.len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Empties the cache registered as `name` in the global registry.
///
/// # Errors
///
/// Returns [`CacheError::NotCached`] if no cached function or shared type
/// cache was registered under `name`.
pub fn clear_cache(name: &str) -> Result<(), CacheError> {
    CacheRegistry::global().clear(name)
}

/// Registers `pool` in the global registry.
pub fn register_pool<K, V, M>(pool: &'static CachePool<K, V, M>)
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    M: ExecutionMode,
{
    CacheRegistry::global().register_pool(pool);
}
