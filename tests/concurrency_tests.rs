// Tests for at-most-once computation under concurrent callers

use callcache::{cached, wrap, ExpirationPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

static TOKEN_CALLS: AtomicU32 = AtomicU32::new(0);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1000);

#[cached]
fn issue_token(account: u32) -> u64 {
    TOKEN_CALLS.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    NEXT_TOKEN.fetch_add(1, Ordering::SeqCst) + u64::from(account)
}

#[test]
fn test_racing_callers_share_one_computation() {
    let barrier = Arc::new(Barrier::new(50));
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                issue_token(1)
            })
        })
        .collect();

    let tokens: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(TOKEN_CALLS.load(Ordering::SeqCst), 1);
    assert!(tokens.iter().all(|&t| t == tokens[0]));
}

static SLOW_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached]
fn slow_square(x: u64) -> u64 {
    SLOW_CALLS.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(200));
    x * x
}

#[test]
fn test_different_keys_compute_in_parallel() {
    let started = Instant::now();
    let handles: Vec<_> = (0..4u64)
        .map(|x| thread::spawn(move || slow_square(x)))
        .collect();
    let results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results, vec![0, 1, 4, 9]);
    assert_eq!(SLOW_CALLS.load(Ordering::SeqCst), 4);
    // Serialized computations would take at least 800ms.
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[test]
fn test_wrapped_closure_under_race() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    let lookup = Arc::new(wrap(
        move |host: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            format!("{host}:5432")
        },
        ExpirationPolicy::ttl_str("5m").unwrap(),
    ));

    let barrier = Arc::new(Barrier::new(20));
    let handles: Vec<_> = (0..20)
        .map(|_| {
            let lookup = Arc::clone(&lookup);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                lookup.call("db".to_string())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "db:5432");
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

static COUNTED_CALLS: AtomicU32 = AtomicU32::new(0);

/// Returns the index of the computation that produced the value.
#[cached(count = 10)]
fn counted() -> u32 {
    let index = COUNTED_CALLS.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(5));
    index
}

#[test]
fn test_count_window_is_never_exceeded_concurrently() {
    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| (0..25).map(|_| counted()).collect::<Vec<u32>>()))
        .collect();

    let mut served: HashMap<u32, usize> = HashMap::new();
    for handle in handles {
        for index in handle.join().unwrap() {
            *served.entry(index).or_default() += 1;
        }
    }

    assert_eq!(served.values().sum::<usize>(), 200);
    for (index, calls) in &served {
        assert!(*calls <= 10, "value of computation {index} served {calls} times");
    }
    assert!(COUNTED_CALLS.load(Ordering::SeqCst) >= 20);
}
