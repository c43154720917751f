//! # Callcache
//!
//! Thread-safe memoization for functions, methods and properties.
//!
//! ## Features
//!
//! - **Easy to use**: Add `#[cached]` to any function or method
//! - **At most once**: Concurrent callers with the same arguments share one
//!   computation, the others wait for its result
//! - **Expiration**: Keep results forever, for a time-to-live (`"1h30m"`) or
//!   for a number of calls
//! - **Result-aware**: Only `Ok` values are cached
//! - **Clear by name**: [`clear_cache`] empties any registered cache
//! - **Instance caches**: Per-instance or per-type caches for methods and
//!   properties, see [`TypeCacheConfig`]
//!
//! For `async fn`, use the `callcache-async` crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use callcache::cached;
//!
//! #[cached]
//! fn fibonacci(n: u32) -> u64 {
//!     if n <= 1 {
//!         return n as u64;
//!     }
//!     fibonacci(n - 1) + fibonacci(n - 2)
//! }
//!
//! // First call computes the result
//! let result1 = fibonacci(50);
//! // Second call returns the cached result
//! let result2 = fibonacci(50);
//! assert_eq!(result1, result2);
//! ```
//!
//! ## Expiration
//!
//! ```rust
//! use callcache::cached;
//!
//! // Recomputed at most every hour and a half
//! #[cached(ttl = "1h30m")]
//! fn daily_report(day: u32) -> String {
//!     format!("report for day {day}")
//! }
//!
//! // Recomputed every third call
//! #[cached(count = 3)]
//! fn sample(sensor: u8) -> u16 {
//!     u16::from(sensor) * 10
//! }
//!
//! assert_eq!(daily_report(1), "report for day 1");
//! assert_eq!(sample(4), 40);
//! ```
//!
//! ## Custom Cache Keys
//!
//! Arguments are turned into an invocation key through [`CacheableKey`]:
//!
//! ```rust
//! use callcache::{cached, CacheableKey, DefaultCacheableKey};
//!
//! #[derive(Debug, Clone)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! // Debug-based key
//! impl DefaultCacheableKey for User {}
//!
//! struct Session {
//!     token: String,
//! }
//!
//! // Custom key
//! impl CacheableKey for Session {
//!     fn to_cache_key(&self) -> String {
//!         format!("session:{}", self.token)
//!     }
//! }
//!
//! #[cached]
//! fn greeting(user: &User, session: &Session) -> String {
//!     format!("hello {} ({})", user.name, session.token.len())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use callcache::cached;
//!
//! #[cached]
//! fn divide(a: i32, b: i32) -> Result<i32, String> {
//!     if b == 0 {
//!         Err("Division by zero".to_string())
//!     } else {
//!         Ok(a / b)
//!     }
//! }
//!
//! // Ok results are cached
//! assert_eq!(divide(10, 2), Ok(5));
//! // Err results are NOT cached
//! assert!(divide(10, 0).is_err());
//! ```
//!
//! ## Clearing
//!
//! ```rust
//! use callcache::{cached, clear_cache, CacheError};
//!
//! #[cached(name = "settings")]
//! fn settings() -> Vec<String> {
//!     vec!["verbose".to_string()]
//! }
//!
//! settings();
//! clear_cache("settings").unwrap();
//! assert_eq!(clear_cache("unknown"), Err(CacheError::NotCached("unknown".to_string())));
//! ```

pub use callcache_core::*;
pub use callcache_macros::cached;

/// Empties every cache registered in the global registry and returns how
/// many there were.
pub fn clear_all_caches() -> usize {
    registry::CacheRegistry::global().clear_all()
}

/// Returns the names of all caches registered in the global registry.
pub fn cache_names() -> Vec<String> {
    registry::CacheRegistry::global().names()
}
