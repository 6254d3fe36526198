//! Request and response values passed through the pipeline

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sessionlink_common::cache::Fingerprint;

use super::errors::ApiError;

/// A request to the application API
///
/// Built with the method constructors and chained setters:
///
/// ```
/// use sessionlink_client::api::ApiRequest;
///
/// let request = ApiRequest::get("/tasks").query("page", "2").query("sort", "due");
/// assert!(request.is_cacheable());
///
/// let update = ApiRequest::put("/tasks/7").invalidates("/tasks");
/// assert!(!update.is_cacheable());
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    cache: Option<bool>,
    retry_on_unauthorized: bool,
    invalidates: Vec<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            cache: None,
            retry_on_unauthorized: true,
            invalidates: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    /// Returns [`ApiError::Encode`] if `body` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(self.body(value))
    }

    /// Force caching on or off for this request. By default only GET is
    /// cached.
    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    /// Whether a 401 should trigger a credential refresh and one retry
    /// (default `true`). Disable for calls such as sign-in whose 401 means
    /// "wrong password" rather than "expired token".
    #[must_use]
    pub fn retry_on_unauthorized(mut self, enabled: bool) -> Self {
        self.retry_on_unauthorized = enabled;
        self
    }

    /// Drop cached reads whose fingerprint contains `pattern` once this
    /// request succeeds.
    #[must_use]
    pub fn invalidates(mut self, pattern: impl Into<String>) -> Self {
        self.invalidates.push(pattern.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn json_body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub(crate) fn retries_on_unauthorized(&self) -> bool {
        self.retry_on_unauthorized
    }

    pub(crate) fn invalidation_patterns(&self) -> &[String] {
        &self.invalidates
    }

    /// Whether a successful response may be served from and stored in the
    /// response cache
    pub fn is_cacheable(&self) -> bool {
        self.cache.unwrap_or(self.method == Method::GET)
    }

    /// Cache key for this request
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.method.as_str(), &self.path, self.query.iter().map(|(k, v)| (k, v)))
    }
}

/// Successful response from the application API
///
/// Cheap to clone; the body is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: Arc<[u8]>,
    from_cache: bool,
}

impl ApiResponse {
    pub(crate) fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body: body.into(), from_cache: false }
    }

    pub(crate) fn cached(&self) -> Self {
        Self { from_cache: true, ..self.clone() }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether this response was answered by the response cache
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Body as UTF-8 text.
    ///
    /// # Errors
    /// Returns [`ApiError::Decode`] for non UTF-8 bodies.
    pub fn text(&self) -> Result<&str, ApiError> {
        std::str::from_utf8(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Deserialize the JSON body.
    ///
    /// An empty body (204/205) deserializes from `null`, so `()` and
    /// `Option<T>` targets work.
    ///
    /// # Errors
    /// Returns [`ApiError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_value(Value::Null).map_err(|_| {
                ApiError::Decode(format!(
                    "Empty response ({}), but response type cannot be deserialized from empty body",
                    self.status
                ))
            });
        }
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
