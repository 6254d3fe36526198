//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SESSIONLINK_API_BASE_URL` is not set, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `SESSIONLINK_API_BASE_URL`: Application API base URL (required)
//! - `SESSIONLINK_AUTH_BASE_URL`: Auth server base URL (defaults to the API
//!   base URL)
//! - `SESSIONLINK_REFRESH_PATH`: Refresh endpoint path
//! - `SESSIONLINK_REQUEST_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `SESSIONLINK_CACHE_TTL_MS`: Response cache TTL in milliseconds (0
//!   disables the cache)
//! - `SESSIONLINK_USER_AGENT`: User agent header
//! - `SESSIONLINK_STORAGE`: `memory`, `file` or `keychain`
//! - `SESSIONLINK_STORAGE_PATH`: Credential file path for file storage
//! - `SESSIONLINK_KEYCHAIN_SERVICE`: Keychain service name
//! - `SESSIONLINK_REFRESH_FIELD`: JSON field carrying the refresh token
//! - `SESSIONLINK_KEEP_SESSION_ON_NETWORK_ERROR`: Keep the credential when the
//!   refresh endpoint is unreachable (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./sessionlink.toml` or `./sessionlink.json` (current working
//!    directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `../sessionlink.toml` or `../sessionlink.json` (parent directory)
//! 4. Relative to executable location
//! 5. `<config dir>/sessionlink/config.toml`

use std::path::{Path, PathBuf};

use sessionlink_domain::constants::APP_DIR_NAME;
use sessionlink_domain::{
    ClientConfig, Result, SessionLinkError, StorageKind, TransportFailurePolicy,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `SessionLinkError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `SESSIONLINK_API_BASE_URL` is required; everything else falls back to
/// [`ClientConfig::default`].
///
/// # Errors
/// Returns `SessionLinkError::Config` if the required variable is missing or
/// a variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let api_base_url = env_var("SESSIONLINK_API_BASE_URL")?;
    let mut config = ClientConfig {
        auth_base_url: optional_env("SESSIONLINK_AUTH_BASE_URL")
            .unwrap_or_else(|| api_base_url.clone()),
        api_base_url,
        ..ClientConfig::default()
    };

    if let Some(path) = optional_env("SESSIONLINK_REFRESH_PATH") {
        config.refresh_path = path;
    }
    if let Some(raw) = optional_env("SESSIONLINK_REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = raw.parse::<u64>().map_err(|e| {
            SessionLinkError::Config(format!("Invalid request timeout: {}", e))
        })?;
    }
    if let Some(raw) = optional_env("SESSIONLINK_CACHE_TTL_MS") {
        config.cache_ttl_ms = raw
            .parse::<u64>()
            .map_err(|e| SessionLinkError::Config(format!("Invalid cache TTL: {}", e)))?;
    }
    if let Some(agent) = optional_env("SESSIONLINK_USER_AGENT") {
        config.user_agent = agent;
    }

    if let Some(kind) = optional_env("SESSIONLINK_STORAGE") {
        config.storage.kind = parse_storage_kind(&kind)?;
    }
    if let Some(path) = optional_env("SESSIONLINK_STORAGE_PATH") {
        config.storage.path = Some(PathBuf::from(path));
    }
    if let Some(service) = optional_env("SESSIONLINK_KEYCHAIN_SERVICE") {
        config.storage.service = service;
    }

    if let Some(field) = optional_env("SESSIONLINK_REFRESH_FIELD") {
        config.refresh.request_field = field;
    }
    if env_bool("SESSIONLINK_KEEP_SESSION_ON_NETWORK_ERROR", false) {
        config.refresh.on_transport_error = TransportFailurePolicy::KeepSession;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `SessionLinkError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SessionLinkError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SessionLinkError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SessionLinkError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `SessionLinkError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SessionLinkError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SessionLinkError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(SessionLinkError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// See the module documentation for the search order.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
        candidates.extend(vec![cwd.join("../sessionlink.toml"), cwd.join("../sessionlink.json")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(APP_DIR_NAME).join("config.toml"));
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("sessionlink.toml"),
        dir.join("sessionlink.json"),
        dir.join("config.toml"),
        dir.join("config.json"),
    ]
}

fn parse_storage_kind(raw: &str) -> Result<StorageKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageKind::Memory),
        "file" => Ok(StorageKind::File),
        "keychain" => Ok(StorageKind::Keychain),
        other => Err(SessionLinkError::Config(format!("Invalid storage kind: {}", other))),
    }
}

/// Get required environment variable
///
/// # Errors
/// Returns `SessionLinkError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        SessionLinkError::Config(format!("Missing required environment variable: {}", key))
    })
}

// Unset and empty are the same thing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
