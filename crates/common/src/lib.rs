//! Common utilities shared across SessionLink crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - (always on): error classification and the clock abstraction
//! - `runtime`: response cache and request fingerprints
//! - `test-utils`: helpers for tests in downstream crates

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
pub mod error;
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{CacheStats, Fingerprint, ResponseCache};
pub use error::{ErrorClassification, ErrorSeverity};
pub use time::{Clock, MockClock, SystemClock};
