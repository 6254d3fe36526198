//! Thin reqwest wrapper shared by the API pipeline and the refresh client

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, HttpError};
