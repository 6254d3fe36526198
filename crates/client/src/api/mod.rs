//! Request pipeline
//!
//! [`ApiClient`] is the entry point for application code: it attaches the
//! bearer credential, recovers from expired access tokens through the
//! refresh coordinator, and answers repeated reads from the response cache.

pub mod client;
pub mod errors;
pub mod request;

pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{ApiError, ApiErrorCategory};
pub use request::{ApiRequest, ApiResponse};
