//! Compound duration strings such as `"1h30m"` or `"2d"`.
//!
//! The accepted grammar is `<y>y<d>d<h>h<m>m<s>s`, where every component is
//! optional but components must appear in that order, each value may carry a
//! fractional part (`"1.5h"`), units are case-insensitive and the unit of the
//! last component may be omitted, in which case it counts as seconds. A bare
//! number (`"90"`) is therefore a number of seconds.
//!
//! Parsing happens once, when a cache is configured, never per call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::CacheError;

/// One capture group per unit, in the order the units must appear.
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \A
        (?:([0-9]+(?:\.[0-9]+)?)y)?
        (?:([0-9]+(?:\.[0-9]+)?)d)?
        (?:([0-9]+(?:\.[0-9]+)?)h)?
        (?:([0-9]+(?:\.[0-9]+)?)m)?
        (?:([0-9]+(?:\.[0-9]+)?)s?)?
        \z",
    )
    .unwrap()
});

/// Seconds per unit, matching the capture groups of [`DURATION_RE`].
const UNIT_SECONDS: [f64; 5] = [31_536_000.0, 86_400.0, 3_600.0, 60.0, 1.0];

/// Parses a compound duration string into a number of seconds.
///
/// # Errors
///
/// Returns [`CacheError::Configuration`] if the string is empty, contains a
/// character that is neither a digit nor a known unit, repeats a unit or lists
/// units out of order.
///
/// # Examples
///
/// ```
/// use callcache_core::parse_duration;
///
/// assert_eq!(parse_duration("1h30m").unwrap(), 5400.0);
/// assert_eq!(parse_duration("90").unwrap(), 90.0);
/// assert_eq!(parse_duration("1.5m").unwrap(), 90.0);
/// assert_eq!(parse_duration("1d2h").unwrap(), 93_600.0);
/// assert!(parse_duration("1x").is_err());
/// assert!(parse_duration("30m1h").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<f64, CacheError> {
    let malformed = || CacheError::configuration(format!("duration {input:?} format is incorrect"));

    if input.is_empty() {
        return Err(malformed());
    }
    let captures = DURATION_RE.captures(input).ok_or_else(malformed)?;

    let mut total = 0.0;
    for (group, seconds) in captures.iter().skip(1).zip(UNIT_SECONDS) {
        if let Some(value) = group {
            let value: f64 = value.as_str().parse().map_err(|_| malformed())?;
            total += value * seconds;
        }
    }
    Ok(total)
}
