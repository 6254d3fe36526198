//! Integration tests for the response cache
//!
//! Covers fingerprint canonicalization through the public API, TTL expiry
//! with a mock clock, invalidation, and concurrent access.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sessionlink_common::cache::{Fingerprint, ResponseCache};
use sessionlink_common::time::MockClock;

/// Verifies that logically identical reads share one cache entry.
///
/// # Test Steps
/// 1. Store a value under a fingerprint built with params in one order
/// 2. Look it up with params in another order and one param embedded in the
///    path
/// 3. Verify the stored value is returned
#[test]
fn test_equivalent_requests_share_entry() {
    let cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(1));

    cache.store(
        &Fingerprint::new("GET", "/tasks", [("status", "open"), ("page", "1")]),
        "page-1".to_string(),
    );

    let hit = cache.lookup(&Fingerprint::new("get", "/tasks?page=1", [("status", "open")]));
    assert_eq!(hit.as_deref().map(String::as_str), Some("page-1"));
}

/// Validates expiry at the TTL boundary and that a refreshed store survives.
///
/// # Test Steps
/// 1. Store under a 1s TTL with a mock clock
/// 2. Advance 1s and verify the entry is gone
/// 3. Store again, advance 500ms, verify it is still served
#[test]
fn test_ttl_expiry_with_mock_clock() {
    let clock = MockClock::new();
    let cache = ResponseCache::with_clock(Duration::from_secs(1), clock.clone());
    let key = Fingerprint::of("GET", "/profile");

    cache.store(&key, 1_u32);
    clock.advance(Duration::from_secs(1));
    assert!(cache.lookup(&key).is_none());

    cache.store(&key, 2_u32);
    clock.advance_millis(500);
    assert_eq!(cache.lookup(&key).as_deref(), Some(&2));

    let stats = cache.stats();
    assert_eq!(stats.expirations, 1);
    assert_eq!(stats.inserts, 2);
}

/// Validates that invalidation after a write removes only related reads.
///
/// # Test Steps
/// 1. Cache a task list, a single task and an unrelated notes list
/// 2. Invalidate by the `/tasks` substring
/// 3. Verify only the notes entry remains
#[test]
fn test_invalidate_related_reads() {
    let cache: ResponseCache<&'static str> = ResponseCache::new(Duration::from_secs(1));
    cache.store(&Fingerprint::new("GET", "/tasks", [("page", "1")]), "list");
    cache.store(&Fingerprint::of("GET", "/tasks/42"), "task");
    cache.store(&Fingerprint::of("GET", "/notes"), "notes");

    assert_eq!(cache.invalidate(Some("/tasks")), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.lookup(&Fingerprint::of("GET", "/notes")).is_some());
}

/// Verifies concurrent readers and writers never observe torn values.
///
/// # Test Steps
/// 1. Spawn writer threads that overwrite the same key with whole vectors
/// 2. Spawn reader threads that check every observed vector is uniform
/// 3. Join all threads
#[test]
fn test_concurrent_access() {
    let cache: Arc<ResponseCache<Vec<usize>>> =
        Arc::new(ResponseCache::new(Duration::from_secs(60)));
    let key = Fingerprint::of("GET", "/shared");

    let mut handles = Vec::new();
    for writer in 0..4 {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                cache.store(&key, vec![writer; 16]);
            }
        }));
    }
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                if let Some(value) = cache.lookup(&key) {
                    assert!(value.iter().all(|v| *v == value[0]));
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("thread panicked");
    }
    assert_eq!(cache.len(), 1);
}

/// Verifies a disabled cache never serves stale data.
#[test]
fn test_zero_ttl_never_hits() {
    let cache: ResponseCache<u8> = ResponseCache::new(Duration::ZERO);
    let key = Fingerprint::of("GET", "/tasks");
    cache.store(&key, 1);
    assert!(cache.lookup(&key).is_none());
    assert_eq!(cache.stats().inserts, 0);
}
