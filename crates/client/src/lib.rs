//! # SessionLink Client
//!
//! Bearer-token HTTP client layer.
//!
//! This crate contains:
//! - Credential storage (memory, JSON file, platform keychain)
//! - The single-flight refresh coordinator
//! - The request pipeline ([`ApiClient`]) with a short-lived read cache
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Depends on `sessionlink-domain` for types and configuration
//! - Depends on `sessionlink-common` for the response cache
//! - Contains all I/O (HTTP, files, keychain)
//!
//! ```no_run
//! use sessionlink_client::{ApiClient, ApiRequest};
//! use sessionlink_domain::{ClientConfig, Credential};
//!
//! # async fn run() -> Result<(), sessionlink_client::ApiError> {
//! let client = ApiClient::new(ClientConfig::for_base_url("https://api.example.com"))?;
//! client.login(Credential::new("access", "refresh"));
//!
//! let tasks = client.execute(ApiRequest::get("/tasks").query("page", "1")).await?;
//! println!("{}", tasks.text()?);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod credentials;
pub mod http;
pub mod observability;
pub mod refresh;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiError, ApiErrorCategory, ApiRequest, ApiResponse};
pub use credentials::{CredentialStore, MemoryCredentialStore, PersistentCredentialStore};
pub use refresh::{RefreshCoordinator, RefreshFailure, SessionEvent};
