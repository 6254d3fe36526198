//! Short-lived response cache for idempotent reads
//!
//! The cache de-duplicates bursts of identical reads (re-render storms,
//! several widgets asking for the same list). It is not a freshness cache:
//! the TTL is on the order of a second and callers that mutate a resource
//! invalidate the related reads themselves.
//!
//! # Features
//!
//! - **Canonical keys**: [`Fingerprint`] sorts query parameters so logically
//!   identical requests always collide
//! - **Immutable entries**: values are stored as `Arc<V>` and overwritten
//!   wholesale, never mutated in place
//! - **Lazy expiry**: expired entries are dropped on lookup; there is no
//!   background sweep
//! - **Testable**: clock abstraction for deterministic TTL tests
//!
//! # Example
//! ```
//! use std::time::Duration;
//!
//! use sessionlink_common::cache::{Fingerprint, ResponseCache};
//!
//! let cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(1));
//! let key = Fingerprint::new("GET", "/tasks", [("page", "2"), ("sort", "due")]);
//!
//! cache.store(&key, "[...]".to_string());
//! assert_eq!(cache.lookup(&key).as_deref(), Some(&"[...]".to_string()));
//!
//! // After a mutation touching tasks
//! cache.invalidate(Some("/tasks"));
//! assert!(cache.lookup(&key).is_none());
//! ```

mod core;
mod fingerprint;
mod stats;

// Re-export public API
pub use core::ResponseCache;

pub use fingerprint::Fingerprint;
pub use stats::CacheStats;
