//! Application constants
//!
//! Centralized location for the defaults used by configuration and the
//! client layer.

// Remote endpoints
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

// Request handling
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 1_000;
pub const DEFAULT_USER_AGENT: &str = concat!("sessionlink/", env!("CARGO_PKG_VERSION"));

// Refresh payload shape
pub const DEFAULT_REFRESH_REQUEST_FIELD: &str = "refreshToken";
pub const DEFAULT_ACCESS_TOKEN_FIELDS: &[&str] = &["accessToken", "token", "access_token"];
pub const DEFAULT_REFRESH_TOKEN_FIELDS: &[&str] = &["refreshToken", "refresh_token"];

// Persistence
pub const DEFAULT_CREDENTIAL_KEY: &str = "credential";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "SessionLink.auth";
pub const APP_DIR_NAME: &str = "sessionlink";

// Session event fan-out
pub const SESSION_EVENT_CAPACITY: usize = 16;
