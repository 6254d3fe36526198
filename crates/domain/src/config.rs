//! Configuration structures
//!
//! Every field has a default so partial TOML/JSON files and sparse
//! environments load cleanly; [`ClientConfig::validate`] catches values that
//! parse but cannot work.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_FIELDS, DEFAULT_API_BASE_URL, DEFAULT_AUTH_BASE_URL,
    DEFAULT_CACHE_TTL_MS, DEFAULT_CREDENTIAL_KEY, DEFAULT_KEYCHAIN_SERVICE,
    DEFAULT_REFRESH_PATH, DEFAULT_REFRESH_REQUEST_FIELD, DEFAULT_REFRESH_TOKEN_FIELDS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT,
};
use crate::errors::{Result, SessionLinkError};

/// Top-level configuration for the client layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for application requests (e.g., "https://api.example.com/v1")
    pub api_base_url: String,
    /// Base URL of the auth server hosting the refresh endpoint
    pub auth_base_url: String,
    /// Path of the refresh endpoint relative to `auth_base_url`
    pub refresh_path: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Response cache time-to-live in milliseconds (0 disables caching)
    pub cache_ttl_ms: u64,
    /// User agent sent with every request
    pub user_agent: String,
    pub storage: StorageConfig,
    pub refresh: RefreshConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            storage: StorageConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing both the API and the auth server at `base_url`
    #[must_use]
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self { api_base_url: base_url.clone(), auth_base_url: base_url, ..Self::default() }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Full URL of the refresh endpoint
    #[must_use]
    pub fn refresh_url(&self) -> String {
        join_url(&self.auth_base_url, &self.refresh_path)
    }

    /// Full URL for an application path
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    /// Returns `SessionLinkError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        validate_base_url("api_base_url", &self.api_base_url)?;
        validate_base_url("auth_base_url", &self.auth_base_url)?;

        if self.request_timeout_ms == 0 {
            return Err(SessionLinkError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        self.refresh.validate()?;
        self.storage.validate()
    }
}

/// Where the credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Process memory only; nothing survives a restart
    Memory,
    /// JSON record on disk
    #[default]
    File,
    /// Platform keychain (requires the `keychain` feature)
    Keychain,
}

/// Credential persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// File location for [`StorageKind::File`]; `None` uses the platform
    /// data directory
    pub path: Option<PathBuf>,
    /// Keychain service name for [`StorageKind::Keychain`]
    pub service: String,
    /// Well-known key the credential record lives under
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::File,
            path: None,
            service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            key: DEFAULT_CREDENTIAL_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    /// In-memory storage, mostly for tests and short-lived tools
    #[must_use]
    pub fn memory() -> Self {
        Self { kind: StorageKind::Memory, ..Self::default() }
    }

    /// File storage at an explicit path
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { kind: StorageKind::File, path: Some(path.into()), ..Self::default() }
    }

    fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(SessionLinkError::Config("storage.key must not be empty".to_string()));
        }
        if self.kind == StorageKind::Keychain && self.service.trim().is_empty() {
            return Err(SessionLinkError::Config(
                "storage.service must not be empty for keychain storage".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a refresh call that never got an answer does to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailurePolicy {
    /// Treat it like a rejected refresh token: clear the session
    #[default]
    ClearSession,
    /// Keep the credential and report a network failure to the caller
    KeepSession,
}

/// Shape of the refresh exchange and its failure policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// JSON field carrying the refresh token in the request body
    pub request_field: String,
    /// Response fields tried in order for the new access token
    pub access_token_fields: Vec<String>,
    /// Response fields tried in order for a rotated refresh token
    pub refresh_token_fields: Vec<String>,
    pub on_transport_error: TransportFailurePolicy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            request_field: DEFAULT_REFRESH_REQUEST_FIELD.to_string(),
            access_token_fields: DEFAULT_ACCESS_TOKEN_FIELDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            refresh_token_fields: DEFAULT_REFRESH_TOKEN_FIELDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            on_transport_error: TransportFailurePolicy::ClearSession,
        }
    }
}

impl RefreshConfig {
    fn validate(&self) -> Result<()> {
        if self.request_field.trim().is_empty() {
            return Err(SessionLinkError::Config(
                "refresh.request_field must not be empty".to_string(),
            ));
        }
        if self.access_token_fields.iter().all(|f| f.trim().is_empty()) {
            return Err(SessionLinkError::Config(
                "refresh.access_token_fields must name at least one field".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_base_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| SessionLinkError::Config(format!("{field} is not a valid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SessionLinkError::Config(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.refresh.access_token_fields, vec!["accessToken", "token", "access_token"]);
    }

    #[test]
    fn refresh_url_joins_without_double_slash() {
        let config = ClientConfig::for_base_url("https://auth.example.com/");
        assert_eq!(config.refresh_url(), "https://auth.example.com/auth/refresh");
        assert_eq!(config.api_url("tasks"), "https://auth.example.com/tasks");
        assert_eq!(config.api_url("/tasks"), "https://auth.example.com/tasks");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = ClientConfig { api_base_url: "ftp://example.com".into(), ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_base_url"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = ClientConfig { request_timeout_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(SessionLinkError::Config(_))));
    }

    #[test]
    fn rejects_empty_access_token_fields() {
        let mut config = ClientConfig::default();
        config.refresh.access_token_fields = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            api_base_url = "https://api.example.com"

            [refresh]
            on_transport_error = "keep_session"

            [storage]
            kind = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.auth_base_url, DEFAULT_AUTH_BASE_URL);
        assert_eq!(config.refresh.on_transport_error, TransportFailurePolicy::KeepSession);
        assert_eq!(config.refresh.request_field, "refreshToken");
        assert_eq!(config.storage.kind, StorageKind::Memory);
    }
}
