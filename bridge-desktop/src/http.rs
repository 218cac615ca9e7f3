//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("richmedia-core/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Retry of 5xx / 429 responses and transport failures with exponential
///   backoff, honouring `Retry-After` when the server sends one
/// - rustls TLS
pub struct ReqwestHttpClient {
    client: Client,
    default_policy: RetryPolicy,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(client))
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            default_policy: RetryPolicy::default(),
        }
    }

    /// Policy applied by [`HttpClient::execute`]
    pub fn with_default_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn convert_error(error: reqwest::Error) -> BridgeError {
        // Request URLs carry provider credentials in their query
        let error = error.without_url();
        if error.is_timeout() {
            BridgeError::Timeout(error.to_string())
        } else if error.is_connect() {
            BridgeError::Connection(error.to_string())
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }

    async fn execute_with_policy(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let target = loggable_url(&request.url);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, url = %target, "Executing HTTP request");

            let (retry_hint, failure) = match self.build_request(request.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let headers: HashMap<String, String> = response
                        .headers()
                        .iter()
                        .filter_map(|(k, v)| {
                            v.to_str().ok().map(|s| (k.to_string(), s.to_string()))
                        })
                        .collect();
                    let body = response.bytes().await.map_err(Self::convert_error)?;
                    let response = HttpResponse {
                        status,
                        headers,
                        body,
                    };

                    let retryable = response.is_server_error() || status == 429;
                    if !retryable || attempt >= max_attempts {
                        // Callers map the final status themselves
                        return Ok(response);
                    }

                    warn!(status, attempt, url = %target, "HTTP request failed with retryable status");
                    (response.retry_after(), None)
                }
                Err(e) => {
                    let error = Self::convert_error(e);
                    warn!(error = %error, attempt, url = %target, "HTTP request failed");
                    if attempt >= max_attempts {
                        return Err(error);
                    }
                    (None, Some(error))
                }
            };

            let delay = retry_hint
                .map(|hint| hint.min(policy.max_delay))
                .unwrap_or_else(|| policy.delay_for(attempt));
            debug!(
                delay_ms = delay.as_millis() as u64,
                last_error = ?failure,
                "Retrying after delay"
            );
            sleep(delay).await;
        }
    }
}

/// Strip the query string so API keys and client ids never reach the logs.
fn loggable_url(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_policy(request, self.default_policy.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = ReqwestHttpClient::new().unwrap();
        assert_eq!(client.default_policy.max_attempts, 3);

        let client = client.with_default_policy(RetryPolicy::no_retry());
        assert_eq!(client.default_policy.max_attempts, 1);
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Head),
            reqwest::Method::HEAD
        );
    }

    #[test]
    fn test_loggable_url_drops_query() {
        assert_eq!(
            loggable_url("https://api.soundcloud.com/resolve?url=x&client_id=secret"),
            "https://api.soundcloud.com/resolve"
        );
        assert_eq!(
            loggable_url("https://api.spotify.com/v1/tracks/1"),
            "https://api.spotify.com/v1/tracks/1"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let client = ReqwestHttpClient::new()
            .unwrap()
            .with_default_policy(RetryPolicy::no_retry());

        let result = client
            .execute(HttpRequest::get("http://127.0.0.1:9/unreachable"))
            .await;

        assert!(matches!(
            result,
            Err(BridgeError::Connection(_)) | Err(BridgeError::Timeout(_))
        ));
    }
}
