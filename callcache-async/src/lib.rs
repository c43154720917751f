//! # Callcache Async
//!
//! Memoization for `async fn`, built on the same engine as `callcache`.
//!
//! Tasks that call a cached async function with the same arguments while its
//! body is running are suspended until the single running computation
//! completes, then all receive its result. Cache hits never suspend.
//!
//! ## Quick Start
//!
//! ```rust
//! use callcache_async::cached_async;
//!
//! #[cached_async(ttl = "10m")]
//! async fn fetch_profile(id: u64) -> String {
//!     // Simulates a slow backend call
//!     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!     format!("profile {id}")
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! assert_eq!(fetch_profile(7).await, "profile 7");
//! // Served from the cache
//! assert_eq!(fetch_profile(7).await, "profile 7");
//! # }
//! ```
//!
//! ## Wrapping closures
//!
//! ```rust
//! use callcache_async::{wrap_async, ExpirationPolicy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let lookup = wrap_async(
//!     |host: String| async move { format!("10.0.0.1 ({host})") },
//!     ExpirationPolicy::count(5),
//! );
//! assert_eq!(lookup.call("db".to_string()).await, "10.0.0.1 (db)");
//! # }
//! ```

// Re-export the macro
pub use callcache_async_macros::cached_async;

pub use callcache_core::{
    clear_cache, registry, wrap_async, Async, AsyncCachedFn, CacheError, CachePool, CacheableKey,
    DefaultCacheableKey, ExpirationPolicy, InvocationKey,
};

#[cfg(feature = "stats")]
pub use callcache_core::{stats_registry, CacheStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{cached_async, clear_cache, wrap_async, CacheableKey, ExpirationPolicy};

    #[cfg(feature = "stats")]
    pub use crate::{stats_registry, CacheStats};
}
