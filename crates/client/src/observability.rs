//! Tracing setup for binaries embedding the client layer

use sessionlink_domain::SessionLinkError;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (for example
/// `"info,sessionlink_client=debug"`). Set `json` for machine-readable
/// output.
///
/// # Errors
/// Returns `SessionLinkError::Internal` if a global subscriber is already
/// installed.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<(), SessionLinkError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if json { builder.json().try_init() } else { builder.try_init() };
    result.map_err(|e| SessionLinkError::Internal(format!("Failed to initialize tracing: {e}")))
}
