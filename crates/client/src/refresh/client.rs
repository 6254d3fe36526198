//! Refresh endpoint client

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use sessionlink_domain::{ClientConfig, RefreshConfig, TokenGrant};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::http::{HttpClient, HttpError};

/// Why a refresh call did not produce a grant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The auth server answered with a non-success status
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    /// No answer at all (connection failure, timeout)
    #[error("refresh transport failure: {0}")]
    Transport(String),

    /// Success status but no usable access token in the body
    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl RefreshError {
    /// Whether the server never answered
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<HttpError> for RefreshError {
    fn from(err: HttpError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Exchanges a refresh token for a new grant
///
/// One call per refresh; the coordinator guarantees callers never overlap.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;
}

/// [`RefreshClient`] that POSTs to the configured refresh endpoint
///
/// The request goes out without an `Authorization` header and never passes
/// through the request pipeline, so a failing refresh cannot trigger another
/// refresh.
pub struct HttpRefreshClient {
    http: HttpClient,
    url: String,
    config: RefreshConfig,
}

impl HttpRefreshClient {
    pub fn new(http: HttpClient, url: impl Into<String>, config: RefreshConfig) -> Self {
        Self { http, url: url.into(), config }
    }

    /// Client for `config.refresh_url()` with `config.refresh` field names
    pub fn from_config(http: HttpClient, config: &ClientConfig) -> Self {
        Self::new(http, config.refresh_url(), config.refresh.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RefreshClient for HttpRefreshClient {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let mut body = Map::new();
        body.insert(self.config.request_field.clone(), Value::String(refresh_token.to_string()));

        let request = self.http.request(Method::POST, &self.url).json(&Value::Object(body));
        let response = self.http.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "refresh endpoint rejected the refresh token");
            return Err(RefreshError::Rejected { status: status.as_u16() });
        }

        let bytes = self.http.read_body(response).await?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|e| RefreshError::Malformed(format!("response is not JSON: {e}")))?;

        parse_grant(&payload, &self.config)
    }
}

/// Pull the new token pair out of a refresh response.
fn parse_grant(payload: &Value, config: &RefreshConfig) -> Result<TokenGrant, RefreshError> {
    let access_token = first_token(payload, &config.access_token_fields).ok_or_else(|| {
        RefreshError::Malformed(format!(
            "none of [{}] holds an access token",
            config.access_token_fields.join(", ")
        ))
    })?;
    let refresh_token = first_token(payload, &config.refresh_token_fields);

    Ok(TokenGrant { access_token, refresh_token })
}

// First field holding a non-empty string wins.
fn first_token(payload: &Value, fields: &[String]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| payload.get(field).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> HttpRefreshClient {
        let config = ClientConfig::for_base_url(server.uri());
        HttpRefreshClient::from_config(HttpClient::new().expect("http client"), &config)
    }

    #[test]
    fn parse_grant_tries_fields_in_order() {
        let config = RefreshConfig::default();

        let grant = parse_grant(&json!({ "token": "A2" }), &config).unwrap();
        assert_eq!(grant.access_token, "A2");
        assert_eq!(grant.refresh_token, None);

        let grant =
            parse_grant(&json!({ "accessToken": "", "access_token": "A3", "refresh_token": "R3" }), &config)
                .unwrap();
        assert_eq!(grant.access_token, "A3");
        assert_eq!(grant.refresh_token.as_deref(), Some("R3"));
    }

    #[test]
    fn parse_grant_without_access_token_is_malformed() {
        let result = parse_grant(&json!({ "refreshToken": "R2" }), &RefreshConfig::default());
        assert!(matches!(result, Err(RefreshError::Malformed(_))));
    }

    #[test]
    fn custom_field_names() {
        let config = RefreshConfig {
            access_token_fields: vec!["jwt".to_string()],
            refresh_token_fields: vec!["renewal".to_string()],
            ..RefreshConfig::default()
        };
        let grant = parse_grant(&json!({ "jwt": "A9", "renewal": "R9" }), &config).unwrap();
        assert_eq!(grant.access_token, "A9");
        assert_eq!(grant.refresh_token.as_deref(), Some("R9"));
    }

    #[tokio::test]
    async fn posts_refresh_token_and_parses_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refreshToken": "R1" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "accessToken": "A2", "refreshToken": "R2" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server).refresh("R1").await.expect("grant");

        assert_eq!(grant.access_token, "A2");
        assert_eq!(grant.refresh_token.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client_for(&server).refresh("R1").await;

        assert_eq!(result, Err(RefreshError::Rejected { status: 403 }));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::for_base_url(format!("http://{addr}"));
        let client = HttpRefreshClient::from_config(HttpClient::new().unwrap(), &config);

        let result = client.refresh("R1").await;
        assert!(result.as_ref().is_err_and(RefreshError::is_transport), "got {result:?}");
    }
}
