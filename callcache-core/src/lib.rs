//! # Callcache Core
//!
//! Thread-safe memoization engine behind the `callcache` crates.
//!
//! The engine maps an invocation of a callable to its previously computed
//! result and decides, on every call, whether that result may be served or
//! must be recomputed.
//!
//! ## Features
//!
//! - **At-most-once computation**: concurrent callers of the same invocation
//!   share a single computation per staleness epoch
//! - **Expiration policies**: keep values forever, for a time-to-live, or for a
//!   number of calls
//! - **Blocking and async**: the same gate drives threads and tokio tasks
//! - **Failure-aware**: errors returned by a computation are propagated and
//!   never memoized
//! - **Named caches**: every named cache can be cleared through
//!   [`clear_cache`]
//! - **Instance caches**: per-instance or per-type pools for methods and
//!   properties
//! - **Statistics** (feature `stats`): hit, miss and failure counters
//!
//! ## Module Organization
//!
//! - [`cache_pool`] - Keyed store of entries with a single expiration policy
//! - [`cache_entry`] - One memoized invocation and the execution modes
//! - `gate` - The at-most-once algorithm, on [`CachePool`]
//! - [`expiration_policy`] - `Forever`, `Ttl` and `Count`
//! - [`duration`] - Compound duration strings such as `"1h30m"`
//! - [`keys`] - Invocation keys and argument rendering
//! - [`cached_fn`] - Callables wrapped with their own pool
//! - [`instance_cache`] - Method and property caches of a type
//! - [`registry`] - Clearing caches by name
//!
//! ## Example
//!
//! ```
//! use callcache_core::{CachePool, ExpirationPolicy};
//! use std::time::Duration;
//!
//! let pool: CachePool<u64, String> =
//!     CachePool::named("render", ExpirationPolicy::ttl(Duration::from_secs(60)));
//!
//! let page = pool.get_or_compute(1, || "page 1".to_string());
//! assert_eq!(page, "page 1");
//! ```

pub mod cache_entry;
pub mod cache_pool;
pub mod cached_fn;
pub mod duration;
mod error;
pub mod expiration_policy;
mod gate;
pub mod instance_cache;
pub mod keys;
pub mod registry;

#[cfg(feature = "stats")]
mod stats;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use cache_entry::{Async, Blocking, CacheEntry, ExecutionMode};
pub use cache_pool::{CachePool, ANONYMOUS_POOL};
pub use cached_fn::{wrap, wrap_async, AsyncCachedFn, CachedFn};
pub use duration::parse_duration;
pub use error::CacheError;
pub use expiration_policy::ExpirationPolicy;
pub use instance_cache::{CachedMember, InstanceCache, TypeCache, TypeCacheConfig};
pub use keys::{CacheableKey, DefaultCacheableKey, InvocationKey};
pub use registry::clear_cache;

#[cfg(feature = "stats")]
pub use stats::CacheStats;

/// Items used by the code generated by the `callcache` macros.
#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
