// Tests for clearing caches by name and for the statistics registry
//
// These tests touch the global registries and run serially.

use callcache::{cache_names, cached, clear_all_caches, clear_cache, stats_registry, wrap};
use callcache::{CacheError, ExpirationPolicy};
use serial_test::serial;
use std::sync::atomic::{AtomicU32, Ordering};

static LOOKUP_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "user_lookup")]
fn lookup_user(id: u32) -> String {
    LOOKUP_CALLS.fetch_add(1, Ordering::SeqCst);
    format!("user-{id}")
}

static SETTINGS_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached]
fn load_settings() -> Vec<String> {
    SETTINGS_CALLS.fetch_add(1, Ordering::SeqCst);
    vec!["debug".to_string()]
}

#[test]
#[serial]
fn test_clear_by_custom_name() {
    LOOKUP_CALLS.store(0, Ordering::SeqCst);
    clear_cache("user_lookup").ok();

    lookup_user(1);
    lookup_user(1);
    assert_eq!(LOOKUP_CALLS.load(Ordering::SeqCst), 1);

    clear_cache("user_lookup").unwrap();
    lookup_user(1);
    assert_eq!(LOOKUP_CALLS.load(Ordering::SeqCst), 2);
}

#[test]
#[serial]
fn test_clear_by_function_name() {
    SETTINGS_CALLS.store(0, Ordering::SeqCst);
    load_settings();
    clear_cache("load_settings").unwrap();
    load_settings();
    assert_eq!(SETTINGS_CALLS.load(Ordering::SeqCst), 2);
    assert!(cache_names().contains(&"load_settings".to_string()));
}

#[test]
#[serial]
fn test_unknown_name_is_not_cached() {
    let err = clear_cache("no_such_cache").unwrap_err();
    assert_eq!(err, CacheError::NotCached("no_such_cache".to_string()));
    assert_eq!(err.to_string(), "\"no_such_cache\" is not cached");
}

#[test]
#[serial]
fn test_caches_register_on_first_call_only() {
    #[cached(name = "registry_lazy_registration")]
    fn never_called() -> u8 {
        0
    }

    assert!(!cache_names().contains(&"registry_lazy_registration".to_string()));
    assert_eq!(
        clear_cache("registry_lazy_registration"),
        Err(CacheError::NotCached("registry_lazy_registration".to_string()))
    );
    never_called();
    assert!(clear_cache("registry_lazy_registration").is_ok());
}

#[test]
#[serial]
fn test_named_wrapper_can_be_cleared() {
    let calls = std::sync::Arc::new(AtomicU32::new(0));
    let counter = std::sync::Arc::clone(&calls);
    let resolve = wrap(
        move |host: &'static str| {
            counter.fetch_add(1, Ordering::SeqCst);
            host.len()
        },
        ExpirationPolicy::forever(),
    )
    .named("dns_resolve");

    resolve.call("example.org");
    clear_cache("dns_resolve").unwrap();
    resolve.call("example.org");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
#[serial]
fn test_clear_all_caches() {
    LOOKUP_CALLS.store(0, Ordering::SeqCst);
    lookup_user(9);
    assert!(clear_all_caches() >= 1);
    lookup_user(9);
    assert_eq!(LOOKUP_CALLS.load(Ordering::SeqCst), 2);
}

static STATS_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "stats_square")]
fn stats_square(x: u64) -> Result<u64, String> {
    STATS_CALLS.fetch_add(1, Ordering::SeqCst);
    if x == 0 {
        Err("zero".to_string())
    } else {
        Ok(x * x)
    }
}

#[test]
#[serial]
fn test_stats_are_recorded_per_cache() {
    stats_square(3).unwrap();
    stats_registry::reset("stats_square");

    stats_square(4).unwrap();
    stats_square(4).unwrap();
    stats_square(4).unwrap();
    assert!(stats_square(0).is_err());

    let stats = stats_registry::get("stats_square").unwrap();
    assert_eq!(stats.hits(), 2);
    assert_eq!(stats.misses(), 2);
    assert_eq!(stats.failures(), 1);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}
