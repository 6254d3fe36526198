//! API client with transparent credential refresh
//!
//! Every request carries the current bearer token. A 401 triggers one
//! coordinated refresh and one retry; a second 401, or a refresh that fails,
//! ends the session.

use std::sync::Arc;

use regex::Regex;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sessionlink_common::cache::{CacheStats, ResponseCache};
use sessionlink_domain::{ClientConfig, Credential};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use super::request::{ApiRequest, ApiResponse};
use crate::credentials::{open_store, CredentialStore};
use crate::http::HttpClient;
use crate::refresh::{
    HttpRefreshClient, RefreshClient, RefreshCoordinator, RefreshFailure, SessionEvent,
};

/// Outcome of a single send
enum Attempt {
    Success(ApiResponse),
    Unauthorized(String),
}

/// API client with single-flight refresh and a short-lived read cache
pub struct ApiClient {
    http: HttpClient,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
    cache: ResponseCache<ApiResponse>,
}

impl ApiClient {
    /// Create a client from configuration, opening the configured credential
    /// store and refresh endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the configuration is invalid or the
    /// credential store cannot be opened.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder().config(config).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request through the pipeline.
    ///
    /// 1. Cacheable requests are answered from the cache when fresh.
    /// 2. The current access token, if any, is attached as a bearer token.
    /// 3. A 401 leads to one refresh (shared with concurrent callers) and
    ///    one retry with the new token.
    ///
    /// # Errors
    ///
    /// - [`ApiError::SessionTerminated`] when the credential was rejected and
    ///   could not be renewed
    /// - [`ApiError::Http`] for any other non-success status
    /// - [`ApiError::Network`] / [`ApiError::Timeout`] when the server did
    ///   not answer
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let fingerprint =
            (request.is_cacheable() && self.cache.is_enabled()).then(|| request.fingerprint());

        if let Some(fingerprint) = &fingerprint {
            if let Some(hit) = self.cache.lookup(fingerprint) {
                debug!("served from response cache");
                return Ok(hit.cached());
            }
        }

        let mut token = self.store.get().map(|credential| credential.access_token);
        let mut retried = false;

        let response = loop {
            match self.send(&request, token.as_deref()).await? {
                Attempt::Success(response) => break response,
                Attempt::Unauthorized(body) => {
                    if retried {
                        warn!("request rejected again after refresh");
                        if let Some(sent) = token.as_deref() {
                            self.coordinator.reject_token(sent);
                        }
                        return Err(self.session_terminated());
                    }
                    if !request.retries_on_unauthorized() {
                        return Err(ApiError::Http { status: 401, body });
                    }

                    let renewed = match token.as_deref() {
                        Some(sent) => self.coordinator.ensure_valid_token_after(sent).await,
                        None => self.coordinator.ensure_valid_token().await,
                    };
                    match renewed {
                        Ok(new_token) => {
                            debug!("retrying with renewed credential");
                            token = Some(new_token);
                            retried = true;
                        }
                        Err(RefreshFailure::Unavailable(message)) => {
                            return Err(ApiError::Network(message));
                        }
                        Err(failure) => {
                            info!(reason = %failure, "session terminated");
                            return Err(self.session_terminated());
                        }
                    }
                }
            }
        };

        if let Some(fingerprint) = &fingerprint {
            self.cache.store(fingerprint, response.clone());
        }
        for pattern in request.invalidation_patterns() {
            let removed = self.cache.invalidate(Some(pattern));
            debug!(pattern = %pattern, removed, "invalidated cached reads");
        }

        Ok(response)
    }

    /// GET `path` and deserialize the JSON response
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// POST a JSON body to `path` and deserialize the JSON response
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// PUT a JSON body to `path` and deserialize the JSON response
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// DELETE `path`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::delete(path)).await.map(|_| ())
    }

    /// Install a credential obtained by sign-in.
    ///
    /// Cached reads belong to the previous session and are dropped.
    pub fn login(&self, credential: Credential) {
        self.store.set(credential);
        self.cache.invalidate(None);
        info!("credential installed");
    }

    /// Whether a credential is currently stored
    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Sign out: forget the credential and every cached response.
    pub fn clear_session(&self) {
        self.coordinator.clear_session();
        self.cache.invalidate(None);
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.coordinator.subscribe()
    }

    /// Drop cached reads whose fingerprint contains `pattern`, or all of
    /// them. Returns the number removed.
    pub fn invalidate_cache(&self, pattern: Option<&str>) -> usize {
        self.cache.invalidate(pattern)
    }

    /// Drop cached reads whose fingerprint matches `pattern`.
    pub fn invalidate_cache_matching(&self, pattern: &Regex) -> usize {
        self.cache.invalidate_matching(pattern)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn session_terminated(&self) -> ApiError {
        self.cache.invalidate(None);
        ApiError::SessionTerminated
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<Attempt, ApiError> {
        let url = self.config.api_url(request.path());

        let mut builder = self.http.request(request.method().clone(), &url);
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = request.json_body() {
            builder = builder.json(body);
        }

        let response = self.http.send(builder).await?;
        let status = response.status();
        let body = self.http.read_body(response).await?;

        if status.is_success() {
            return Ok(Attempt::Success(ApiResponse::new(status.as_u16(), body)));
        }

        let body = String::from_utf8_lossy(&body).into_owned();
        if status == StatusCode::UNAUTHORIZED {
            debug!(authenticated = token.is_some(), "request unauthorized");
            return Ok(Attempt::Unauthorized(body));
        }

        debug!(%status, "request failed");
        Err(ApiError::Http { status: status.as_u16(), body })
    }
}

/// Builder for API client
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn CredentialStore>>,
    refresh_client: Option<Arc<dyn RefreshClient>>,
}

impl ApiClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `store` instead of the one described by `config.storage`
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `client` instead of calling the configured refresh endpoint
    pub fn refresh_client(mut self, client: Arc<dyn RefreshClient>) -> Self {
        self.refresh_client = Some(client);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client or
    /// credential store cannot be created
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let http = HttpClient::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;

        let store = match self.store {
            Some(store) => store,
            None => open_store(&config.storage)?,
        };

        let refresh_client = match self.refresh_client {
            Some(client) => client,
            None => Arc::new(HttpRefreshClient::from_config(http.clone(), &config)),
        };

        let coordinator = RefreshCoordinator::new(
            Arc::clone(&store),
            refresh_client,
            config.refresh.on_transport_error,
        );
        let cache = ResponseCache::new(config.cache_ttl());

        debug!(api = %config.api_base_url, cache_ttl_ms = config.cache_ttl_ms, "API client ready");

        Ok(ApiClient { http, config, store, coordinator, cache })
    }
}
