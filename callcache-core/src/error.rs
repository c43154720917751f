//! Errors raised by the caching engine itself.
//!
//! Errors produced by a wrapped callable are never converted into a
//! [`CacheError`]: the fallible entry points return the callable's own error
//! type untouched, and such errors are never stored in a pool.

use thiserror::Error;

/// An error raised while configuring or managing a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A policy parameter was rejected when the cache was configured.
    ///
    /// Raised for malformed duration strings, non-numeric counts and unknown
    /// policy strings. Always detected before the first call.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),
    /// A clear was requested for a cache that was never registered.
    #[error("\"{0}\" is not cached")]
    NotCached(String),
    /// A type cache was asked about a member it does not declare.
    #[error("type \"{type_name}\" has no cacheable member \"{member}\"")]
    UnknownMember { type_name: String, member: String },
}

impl CacheError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CacheError::configuration("bad ttl").to_string(),
            "invalid cache configuration: bad ttl"
        );
        assert_eq!(
            CacheError::NotCached("fetch_user".to_string()).to_string(),
            "\"fetch_user\" is not cached"
        );
        assert_eq!(
            CacheError::UnknownMember {
                type_name: "Circle".to_string(),
                member: "volume".to_string(),
            }
            .to_string(),
            "type \"Circle\" has no cacheable member \"volume\""
        );
    }
}
