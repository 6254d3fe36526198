use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use sessionlink_domain::constants::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT};
use thiserror::Error;
use tracing::debug;

/// Transport-level failures: the server never produced a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// HTTP client with a fixed per-request timeout.
///
/// Sends exactly once. Deciding whether a failure is worth another attempt
/// belongs to the caller.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// Any status code, including 4xx/5xx, is a successful send.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HttpError> {
        let request = builder.build().map_err(|err| HttpError::Request(err.to_string()))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, url = %url.path(), "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, url = %url.path(), status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, url = %url.path(), error = %err, "HTTP request failed");
                Err(self.classify(&err))
            }
        }
    }

    /// Read the full body of a response.
    pub async fn read_body(&self, response: Response) -> Result<Vec<u8>, HttpError> {
        response.bytes().await.map(|bytes| bytes.to_vec()).map_err(|err| self.classify(&err))
    }

    pub(crate) fn classify(&self, err: &reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(self.timeout)
        } else if err.is_builder() {
            HttpError::Request(err.to_string())
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, HttpError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| HttpError::Build(err.to_string()))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::{Method, StatusCode};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn sends_exactly_once_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("http client");
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn applies_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "sessionlink-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().user_agent("sessionlink-test").build().expect("client");
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");
        let body = client.read_body(response).await.expect("body");

        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = HttpClient::new().expect("http client");
        let result = client.send(client.request(Method::GET, format!("http://{addr}"))).await;

        assert!(matches!(result, Err(HttpError::Network(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            HttpClient::builder().timeout(Duration::from_millis(50)).build().expect("client");
        let result = client.send(client.request(Method::GET, server.uri())).await;

        assert_eq!(result.err(), Some(HttpError::Timeout(Duration::from_millis(50))));
    }
}
