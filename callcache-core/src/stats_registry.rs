use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::CacheStats;

/// Global registry of pool statistics, indexed by cache name.
///
/// Pools register here when they register in the
/// [`CacheRegistry`](crate::registry::CacheRegistry), so the statistics of
/// any named cache can be read without a handle on its pool.
///
/// # Examples
///
/// ```
/// use callcache_core::stats_registry;
///
/// if let Some(stats) = stats_registry::get("fibonacci") {
///     println!("hit rate: {:.2}%", stats.hit_rate() * 100.0);
/// }
///
/// for name in stats_registry::list() {
///     println!("cached: {name}");
/// }
/// ```
static STATS_REGISTRY: Lazy<RwLock<HashMap<String, Arc<CacheStats>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers the counters of a cache under `name`, replacing any previous ones.
pub fn register(name: &str, stats: Arc<CacheStats>) {
    STATS_REGISTRY.write().insert(name.to_string(), stats);
}

/// Removes the counters registered under `name`.
pub fn unregister(name: &str) -> bool {
    STATS_REGISTRY.write().remove(name).is_some()
}

/// Returns a snapshot of the counters registered under `name`.
pub fn get(name: &str) -> Option<CacheStats> {
    STATS_REGISTRY.read().get(name).map(|stats| (**stats).clone())
}

/// Returns the live counters registered under `name`.
pub fn get_shared(name: &str) -> Option<Arc<CacheStats>> {
    STATS_REGISTRY.read().get(name).map(Arc::clone)
}

/// Lists the names of all registered caches.
pub fn list() -> Vec<String> {
    STATS_REGISTRY.read().keys().cloned().collect()
}

/// Removes every registration without resetting the counters themselves.
pub fn clear() {
    STATS_REGISTRY.write().clear();
}

/// Resets the counters registered under `name`, returning `false` if there
/// are none.
pub fn reset(name: &str) -> bool {
    match STATS_REGISTRY.read().get(name) {
        Some(stats) => {
            stats.reset();
            true
        }
        None => false,
    }
}
