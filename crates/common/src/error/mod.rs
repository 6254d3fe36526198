//! Error classification shared by SessionLink error types
//!
//! Each layer defines its own `thiserror` enum; this module gives them a
//! common vocabulary so callers can make retry and alerting decisions without
//! matching on every variant.
//!
//! ```rust,ignore
//! use sessionlink_common::error::{ErrorClassification, ErrorSeverity};
//!
//! fn log_failure<E: ErrorClassification + std::fmt::Display>(err: &E) {
//!     if err.severity() >= ErrorSeverity::Error {
//!         tracing::error!(retryable = err.is_retryable(), "{err}");
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again by the caller, such as network failures and timeouts.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
