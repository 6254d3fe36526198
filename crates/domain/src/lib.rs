//! # SessionLink Domain
//!
//! Domain types shared by the SessionLink crates.
//!
//! This crate contains:
//! - The bearer [`Credential`] pair and the refresh grant returned by the
//!   auth server
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other SessionLink crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
