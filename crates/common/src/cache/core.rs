//! TTL cache keyed by request fingerprint

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use regex::Regex;
use tracing::trace;

use super::fingerprint::Fingerprint;
use super::stats::{CacheStats, MetricsCollector};
use crate::time::{Clock, SystemClock};

/// Entry stored in the cache
#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

/// Thread-safe response cache with a fixed time-to-live
///
/// # Type Parameters
/// - `V`: cached value (shared out as `Arc<V>`, so no `Clone` bound)
/// - `C`: Clock type for time-based operations (defaults to `SystemClock`)
///
/// A TTL of zero disables the cache: stores are dropped and every lookup
/// misses.
pub struct ResponseCache<V, C = SystemClock>
where
    C: Clock,
{
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    metrics: MetricsCollector,
    clock: C,
}

impl<V> ResponseCache<V, SystemClock> {
    /// Create a new cache with the given TTL using system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<V, C> ResponseCache<V, C>
where
    C: Clock,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self { entries: DashMap::new(), ttl, metrics: MetricsCollector::new(), clock }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the cache stores anything at all
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Look up a fresh value.
    ///
    /// Returns `None` when the fingerprint is absent or its entry is at least
    /// `ttl` old; an expired entry is removed on the way out.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<V>> {
        let key = fingerprint.as_str();
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if now.duration_since(entry.stored_at) < self.ttl {
                self.metrics.record_hit();
                trace!(fingerprint = %key, "response cache hit");
                return Some(Arc::clone(&entry.value));
            }
        } else {
            self.metrics.record_miss();
            return None;
        }

        // Only drop the entry if it is still the expired one; a concurrent
        // store may already have replaced it.
        let removed = self
            .entries
            .remove_if(key, |_, entry| now.duration_since(entry.stored_at) >= self.ttl)
            .is_some();
        if removed {
            self.metrics.record_expiration();
            trace!(fingerprint = %key, "response cache entry expired");
        }
        self.metrics.record_miss();
        None
    }

    /// Store a value, replacing any previous entry and resetting its age.
    pub fn store(&self, fingerprint: &Fingerprint, value: V) -> Arc<V> {
        let value = Arc::new(value);
        if self.is_enabled() {
            let entry = CacheEntry { value: Arc::clone(&value), stored_at: self.clock.now() };
            self.entries.insert(fingerprint.as_str().to_string(), entry);
            self.metrics.record_insert();
        }
        value
    }

    /// Remove entries whose fingerprint contains `pattern`, or every entry
    /// when `pattern` is `None`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let removed = match pattern {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                count
            }
            Some(pattern) => self.remove_where(|key| key.contains(pattern)),
        };
        self.metrics.record_invalidations(removed);
        removed
    }

    /// Remove entries whose fingerprint matches `pattern`.
    pub fn invalidate_matching(&self, pattern: &Regex) -> usize {
        let removed = self.remove_where(|key| pattern.is_match(key));
        self.metrics.record_invalidations(removed);
        removed
    }

    /// Number of stored entries, including expired ones not yet looked up
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of hit/miss counters
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.entries.len())
    }

    fn remove_where(&self, mut matches: impl FnMut(&str) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if matches(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}
