//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use std::time::Duration;

use sessionlink_common::error::{ErrorClassification, ErrorSeverity};
use sessionlink_domain::SessionLinkError;
use thiserror::Error;

use crate::http::HttpError;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// The session is gone (or a 401/403 passed through) - sign in again
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth, undecodable payloads) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Configuration errors - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response from the server
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Non-success status other than a recoverable 401
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Credentials were rejected and could not be renewed
    #[error("Session terminated; sign in again")]
    SessionTerminated,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::SessionTerminated => ApiErrorCategory::Authentication,
            Self::Http { status: 401 | 403, .. } => ApiErrorCategory::Authentication,
            Self::Http { status: 429, .. } => ApiErrorCategory::RateLimit,
            Self::Http { status, .. } if *status >= 500 => ApiErrorCategory::Server,
            Self::Http { .. } | Self::Decode(_) | Self::Encode(_) => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Check if the caller may retry this error as-is
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// Get suggested retry delay in seconds
    pub fn retry_delay_secs(&self) -> u64 {
        match self.category() {
            ApiErrorCategory::RateLimit => 60, // Wait for rate limit window
            ApiErrorCategory::Server => 10,    // Moderate delay for server issues
            ApiErrorCategory::Network => 5,    // Quick retry for network
            ApiErrorCategory::Authentication
            | ApiErrorCategory::Client
            | ApiErrorCategory::Config => 0, // No retry
        }
    }

    /// HTTP status behind the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_terminated(&self) -> bool {
        matches!(self, Self::SessionTerminated)
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ApiErrorCategory::Network | ApiErrorCategory::RateLimit => ErrorSeverity::Warning,
            ApiErrorCategory::Client => ErrorSeverity::Warning,
            ApiErrorCategory::Authentication | ApiErrorCategory::Server => ErrorSeverity::Error,
            ApiErrorCategory::Config => ErrorSeverity::Critical,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self.retry_delay_secs() {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(after) => Self::Timeout(after),
            HttpError::Network(message) => Self::Network(message),
            HttpError::Request(message) | HttpError::Build(message) => Self::Config(message),
        }
    }
}

impl From<SessionLinkError> for ApiError {
    fn from(err: SessionLinkError) -> Self {
        match err {
            SessionLinkError::Network(message) => Self::Network(message),
            SessionLinkError::Serialization(message) => Self::Decode(message),
            SessionLinkError::Config(message)
            | SessionLinkError::Storage(message)
            | SessionLinkError::Internal(message) => Self::Config(message),
        }
    }
}
