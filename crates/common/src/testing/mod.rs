//! Testing utilities shared by downstream crates
//!
//! - **[`init_test_tracing`]**: route `tracing` output through the test
//!   harness, filtered by `RUST_LOG`
//! - **`assert_error_contains!`**: check an error's display text
//!
//! ```rust
//! use sessionlink_common::testing::init_test_tracing;
//!
//! init_test_tracing();
//! let result: Result<(), String> = Err("refresh rejected with 401".to_string());
//! sessionlink_common::assert_error_contains!(result, "rejected");
//! ```

pub mod assertions;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per process.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
