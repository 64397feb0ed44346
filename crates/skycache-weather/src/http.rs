//! Thin HTTP client for upstream weather APIs.
//! Every HTTP status comes back as data; only transport failures are errors.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use skycache_core::{NetworkError, ReqwestErrorExt};

/// Hard limit for one upstream call.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_millis(1500);

const USER_AGENT: &str = concat!("skycache/", env!("CARGO_PKG_VERSION"));

/// Status and raw body of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with the standard upstream timeout.
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_timeout(UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// GET `url` with the given query pairs.
    ///
    /// Non-2xx responses are returned as `Ok`; connection failures,
    /// timeouts and unreadable bodies are `Err`.
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::trace!("GET {} -> {}", url, status);
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_error_status_is_data() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "1,2"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client
            .get(
                &format!("{}/weather", mock_server.uri()),
                &[("q", "1,2".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.body, "down");
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_timeout(Duration::from_millis(50)).unwrap();
        let err = client.get(&mock_server.uri(), &[]).await.unwrap_err();

        assert!(matches!(err.into_network_error(), NetworkError::Timeout));
    }
}
