//! Configuration loading
//!
//! This module provides utilities for loading [`ClientConfig`] from
//! environment variables and files.
//!
//! [`ClientConfig`]: sessionlink_domain::ClientConfig

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
