use std::fmt;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::cache_entry::EntryState;
use crate::{parse_duration, CacheError};

/// Decides when a memoized value must be recomputed.
///
/// The invocation gate consults the policy on every access; the policy never
/// drives the computation itself.
///
/// # Variants
///
/// * `Forever` - a value is computed once and then served until the pool is
///   cleared
/// * `Ttl` - a value is served until `ttl` has elapsed since it was computed
///   - a zero duration makes every access stale (caching is disabled)
/// * `Count` - a value is served for a window of `count` calls, the call that
///   computed it included; the next call recomputes it
///   - a count of zero makes every access stale
///
/// # Examples
///
/// ```
/// use callcache_core::ExpirationPolicy;
/// use std::time::Duration;
///
/// let forever = ExpirationPolicy::forever();
/// let ttl = ExpirationPolicy::ttl_str("1h30m").unwrap();
/// assert_eq!(ttl, ExpirationPolicy::Ttl(Duration::from_secs(5400)));
///
/// let count = ExpirationPolicy::count(3);
/// assert_eq!(count, ExpirationPolicy::Count(3));
///
/// // Non-positive values disable caching
/// assert_eq!(ExpirationPolicy::count(-1), ExpirationPolicy::Count(0));
/// assert_eq!(
///     ExpirationPolicy::ttl_secs(-5.0).unwrap(),
///     ExpirationPolicy::Ttl(Duration::ZERO)
/// );
///
/// let parsed: ExpirationPolicy = "count=5".parse().unwrap();
/// assert_eq!(parsed, ExpirationPolicy::Count(5));
/// assert_eq!(forever, ExpirationPolicy::default());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExpirationPolicy {
    #[default]
    Forever,
    Ttl(Duration),
    Count(u64),
}

impl ExpirationPolicy {
    /// A policy under which values never go stale.
    pub const fn forever() -> Self {
        ExpirationPolicy::Forever
    }

    /// A time-to-live policy.
    pub const fn ttl(ttl: Duration) -> Self {
        ExpirationPolicy::Ttl(ttl)
    }

    /// A time-to-live policy from a number of seconds.
    ///
    /// Values `<= 0` disable caching and `f64::INFINITY` (or any value too
    /// large to represent as a [`Duration`]) means the value never expires.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] for `NaN`.
    pub fn ttl_secs(secs: f64) -> Result<Self, CacheError> {
        if secs.is_nan() {
            return Err(CacheError::configuration("ttl must be a number, not NaN"));
        }
        if secs <= 0.0 {
            return Ok(ExpirationPolicy::Ttl(Duration::ZERO));
        }
        Ok(Duration::try_from_secs_f64(secs)
            .map(ExpirationPolicy::Ttl)
            .unwrap_or(ExpirationPolicy::Forever))
    }

    /// A time-to-live policy from a compound duration string such as `"1h30m"`.
    ///
    /// See [`parse_duration`](crate::parse_duration) for the accepted format.
    pub fn ttl_str(ttl: &str) -> Result<Self, CacheError> {
        Self::ttl_secs(parse_duration(ttl)?)
    }

    /// A call-count policy. Values `<= 0` force a recomputation on every call.
    pub fn count(count: i64) -> Self {
        ExpirationPolicy::Count(count.max(0) as u64)
    }

    /// Returns `true` when a computed value may be served for the current access.
    ///
    /// Under the count policy a successful check consumes one call of the
    /// window; the counter is advanced atomically so that concurrent readers
    /// never share a slot.
    pub(crate) fn try_hit<V>(&self, state: &EntryState<V>) -> bool {
        if state.value.is_none() {
            return false;
        }
        match self {
            ExpirationPolicy::Forever => true,
            ExpirationPolicy::Ttl(_) => state
                .deadline
                .map_or(true, |deadline| Instant::now() < deadline),
            ExpirationPolicy::Count(limit) => state
                .calls
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |calls| {
                    (calls < *limit).then_some(calls + 1)
                })
                .is_ok(),
        }
    }

    /// Starts a new staleness epoch for a freshly computed value.
    pub(crate) fn refresh<V>(&self, state: &mut EntryState<V>) {
        match self {
            ExpirationPolicy::Forever => {}
            ExpirationPolicy::Ttl(ttl) => {
                // An unrepresentable deadline means the value never expires.
                state.deadline = Instant::now().checked_add(*ttl);
            }
            ExpirationPolicy::Count(_) => {
                state.calls.store(1, Ordering::Release);
            }
        }
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationPolicy::Forever => f.write_str("forever"),
            ExpirationPolicy::Ttl(ttl) => write!(f, "ttl={}", ttl.as_secs_f64()),
            ExpirationPolicy::Count(count) => write!(f, "count={count}"),
        }
    }
}

/// Parses `"forever"`, `"ttl=<duration>"` or `"count=<n>"`.
///
/// The duration accepts everything [`parse_duration`](crate::parse_duration)
/// does, so `"ttl=1h30m"` and `"ttl=90"` are both valid.
impl FromStr for ExpirationPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("forever") {
            return Ok(ExpirationPolicy::Forever);
        }
        match s.split_once('=') {
            Some((kind, value)) if kind.trim().eq_ignore_ascii_case("ttl") => {
                Self::ttl_str(value.trim())
            }
            Some((kind, value)) if kind.trim().eq_ignore_ascii_case("count") => value
                .trim()
                .parse::<i64>()
                .map(Self::count)
                .map_err(|_| {
                    CacheError::configuration(format!("count must be an integer, not {value:?}"))
                }),
            _ => Err(CacheError::configuration(format!(
                "unknown expiration policy {s:?}, expected \"forever\", \"ttl=<duration>\" or \"count=<n>\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn computed(value: i32) -> EntryState<i32> {
        let mut state = EntryState::default();
        state.value = Some(value);
        state
    }

    #[test]
    fn test_uncomputed_is_always_stale() {
        let state = EntryState::<i32>::default();
        assert!(!ExpirationPolicy::Forever.try_hit(&state));
        assert!(!ExpirationPolicy::ttl(Duration::from_secs(60)).try_hit(&state));
        assert!(!ExpirationPolicy::Count(3).try_hit(&state));
    }

    #[test]
    fn test_forever_never_stale() {
        let mut state = computed(1);
        ExpirationPolicy::Forever.refresh(&mut state);
        for _ in 0..100 {
            assert!(ExpirationPolicy::Forever.try_hit(&state));
        }
    }

    #[test]
    fn test_ttl_expires() {
        let policy = ExpirationPolicy::ttl(Duration::from_millis(50));
        let mut state = computed(1);
        policy.refresh(&mut state);
        assert!(policy.try_hit(&state));
        thread::sleep(Duration::from_millis(80));
        assert!(!policy.try_hit(&state));
    }

    #[test]
    fn test_zero_ttl_always_stale() {
        let policy = ExpirationPolicy::ttl_secs(0.0).unwrap();
        let mut state = computed(1);
        policy.refresh(&mut state);
        assert!(!policy.try_hit(&state));
    }

    #[test]
    fn test_infinite_ttl_is_forever() {
        assert_eq!(
            ExpirationPolicy::ttl_secs(f64::INFINITY).unwrap(),
            ExpirationPolicy::Forever
        );
        assert!(ExpirationPolicy::ttl_secs(f64::NAN).is_err());
    }

    #[test]
    fn test_count_window() {
        let policy = ExpirationPolicy::Count(3);
        let mut state = computed(1);
        policy.refresh(&mut state);
        // The computing call is the first of the window.
        assert!(policy.try_hit(&state));
        assert!(policy.try_hit(&state));
        assert!(!policy.try_hit(&state));
        assert!(!policy.try_hit(&state));

        policy.refresh(&mut state);
        assert!(policy.try_hit(&state));
    }

    #[test]
    fn test_count_zero_and_one_always_recompute() {
        for limit in [0, 1] {
            let policy = ExpirationPolicy::Count(limit);
            let mut state = computed(1);
            policy.refresh(&mut state);
            assert!(!policy.try_hit(&state));
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "forever".parse::<ExpirationPolicy>().unwrap(),
            ExpirationPolicy::Forever
        );
        assert_eq!(
            "ttl=1h30m".parse::<ExpirationPolicy>().unwrap(),
            ExpirationPolicy::Ttl(Duration::from_secs(5400))
        );
        assert_eq!(
            "TTL = 90".parse::<ExpirationPolicy>().unwrap(),
            ExpirationPolicy::Ttl(Duration::from_secs(90))
        );
        assert_eq!(
            "count=4".parse::<ExpirationPolicy>().unwrap(),
            ExpirationPolicy::Count(4)
        );
        assert!("count=three".parse::<ExpirationPolicy>().is_err());
        assert!("ttl=soon".parse::<ExpirationPolicy>().is_err());
        assert!("lru".parse::<ExpirationPolicy>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        let policy = ExpirationPolicy::Count(7);
        assert_eq!(policy.to_string().parse::<ExpirationPolicy>().unwrap(), policy);
    }
}
