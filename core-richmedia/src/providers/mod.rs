//! # Provider Resolvers
//!
//! One resolver per external media provider. Each refreshes the metadata of
//! fragments that reference it; SoundCloud and Spotify can also turn a
//! [`MediaAsset`] into playable URIs.
//!
//! ## Shared plumbing
//!
//! Resolvers reach provider APIs only through the host [`HttpClient`].
//! [`ProviderHttp`] wraps it with a per-provider rate limiter, a request
//! timeout and the common status-code mapping:
//!
//! | Status        | Error                        |
//! |---------------|------------------------------|
//! | 401 / 403     | [`MediaError::Unauthorized`] |
//! | 404           | [`MediaError::NotFound`]     |
//! | 429           | [`MediaError::RateLimited`]  |
//! | 5xx           | [`MediaError::Network`]      |
//! | other non-2xx | [`MediaError::RemoteApi`]    |
//!
//! Transport failures map to `Network` and undecodable bodies to `Parse`.

pub mod google_maps;
pub mod soundcloud;
pub mod spotify;
pub mod youtube;

pub use google_maps::GoogleMapsResolver;
pub use soundcloud::SoundCloudResolver;
pub use spotify::SpotifyResolver;
pub use youtube::YouTubeResolver;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_messages::{ContentFragment, MediaAsset, MediaProvider, Message};
use core_runtime::config::{CoreConfig, ProviderApiConfig};
use core_runtime::logging::redact_url;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, Result};

const USER_AGENT: &str = "RichMediaCore/0.1";

// =============================================================================
// Resolver Traits
// =============================================================================

/// Refreshes provider metadata for a single fragment.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Provider this resolver serves
    fn provider(&self) -> MediaProvider;

    /// Fetch fresh metadata for `fragment` and return the updated fragment.
    ///
    /// Neither input is modified. Provider failures come back as `Err` and
    /// the caller keeps the previous fragment.
    async fn update_media(
        &self,
        message: &Message,
        fragment: &ContentFragment,
    ) -> Result<ContentFragment>;

    /// Streaming capability, for providers that have one.
    fn streaming(&self) -> Option<&dyn StreamingResolver> {
        None
    }
}

/// Turns a media asset into playable URIs.
#[async_trait]
pub trait StreamingResolver: Send + Sync {
    /// Playable URIs in playback order. Collections expand to one URI per
    /// entry.
    async fn prepare_streaming(&self, asset: &MediaAsset) -> Result<Vec<Url>>;
}

// =============================================================================
// Registry
// =============================================================================

/// Routes a provider tag to its resolver.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<MediaProvider, Arc<dyn MediaResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the resolvers enabled in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::NotConfigured`] when an enabled provider lacks
    /// its credentials.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        let api = &config.provider_api_config;
        let http = &config.http_client;
        let features = &config.features;
        let mut registry = Self::new();

        if features.enable_youtube {
            registry.register(Arc::new(YouTubeResolver::from_config(http.clone(), api)?));
        }
        if features.enable_soundcloud {
            registry.register(Arc::new(SoundCloudResolver::from_config(http.clone(), api)?));
        }
        if features.enable_spotify {
            registry.register(Arc::new(SpotifyResolver::from_config(http.clone(), api)?));
        }
        if features.enable_google_maps {
            registry.register(Arc::new(GoogleMapsResolver::from_config(http.clone(), api)));
        }

        info!(providers = ?registry.providers(), "Resolver registry built");
        Ok(registry)
    }

    /// Register `resolver`, returning the one it replaced.
    pub fn register(&mut self, resolver: Arc<dyn MediaResolver>) -> Option<Arc<dyn MediaResolver>> {
        self.resolvers.insert(resolver.provider(), resolver)
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn MediaResolver>) -> Self {
        self.register(resolver);
        self
    }

    pub fn get(&self, provider: MediaProvider) -> Option<&Arc<dyn MediaResolver>> {
        self.resolvers.get(&provider)
    }

    pub fn contains(&self, provider: MediaProvider) -> bool {
        self.resolvers.contains_key(&provider)
    }

    /// Registered providers in a stable order
    pub fn providers(&self) -> Vec<MediaProvider> {
        let mut providers: Vec<_> = self.resolvers.keys().copied().collect();
        providers.sort();
        providers
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

// =============================================================================
// Shared HTTP Plumbing
// =============================================================================

/// Enforces a minimum delay between consecutive requests.
struct RateLimiter {
    last_request: Option<Instant>,
    min_delay: Duration,
}

impl RateLimiter {
    fn new(min_delay: Duration) -> Self {
        Self {
            last_request: None,
            min_delay,
        }
    }

    async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// HTTP access for one provider: rate limited, timed out, status mapped.
pub(crate) struct ProviderHttp {
    provider: MediaProvider,
    http_client: Arc<dyn HttpClient>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    timeout: Duration,
}

impl ProviderHttp {
    pub(crate) fn new(
        provider: MediaProvider,
        http_client: Arc<dyn HttpClient>,
        config: &ProviderApiConfig,
    ) -> Self {
        Self {
            provider,
            http_client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(config.rate_limit_delay()))),
            timeout: config.request_timeout(),
        }
    }

    /// Send `request` and fail on any non-2xx status.
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let target = redact_url(&request.url);
        debug!(provider = %self.provider, url = %target, "Provider request");

        self.rate_limiter.lock().await.wait_if_needed().await;

        let request = request
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .timeout(self.timeout);

        let response = self.http_client.execute(request).await.map_err(|e| {
            MediaError::Network(format!("{} request failed: {}", self.provider, e))
        })?;

        if !response.is_success() {
            warn!(
                provider = %self.provider,
                status = response.status,
                url = %target,
                "Provider returned error status"
            );
            return Err(status_error(self.provider, &response));
        }

        Ok(response)
    }

    /// Send `request` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.send(request).await?;
        decode_json(self.provider, &response)
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    provider: MediaProvider,
    response: &HttpResponse,
) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| MediaError::Parse(format!("{} response: {}", provider, e)))
}

/// Map a non-2xx response to the matching error.
pub(crate) fn status_error(provider: MediaProvider, response: &HttpResponse) -> MediaError {
    let status = response.status;
    match status {
        401 | 403 => MediaError::Unauthorized(format!("{} rejected the request ({})", provider, status)),
        404 => MediaError::NotFound(format!("{} has no such resource", provider)),
        429 => MediaError::RateLimited {
            provider,
            retry_after: response.retry_after(),
        },
        500..=599 => MediaError::Network(format!("{} returned HTTP {}", provider, status)),
        _ => MediaError::RemoteApi {
            provider,
            status,
            message: body_excerpt(response),
        },
    }
}

fn body_excerpt(response: &HttpResponse) -> String {
    let text = String::from_utf8_lossy(&response.body);
    let text = text.trim();
    match text.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Reject fragments routed to the wrong resolver.
pub(crate) fn ensure_provider(provider: MediaProvider, fragment: &ContentFragment) -> Result<()> {
    match fragment.provider() {
        Some(p) if p == provider => Ok(()),
        _ => Err(MediaError::InvalidReference(format!(
            "{:?} fragment cannot be resolved by {}",
            fragment.kind, provider
        ))),
    }
}

pub(crate) fn ensure_asset(provider: MediaProvider, asset: &MediaAsset) -> Result<()> {
    if asset.provider() == provider {
        Ok(())
    } else {
        Err(MediaError::InvalidReference(format!(
            "{} asset cannot be streamed by {}",
            asset.provider(),
            provider
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use bridge_traits::error::Result;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        pub HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    pub fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: bytes::Bytes::from(body.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{json_response, MockHttpClient};
    use super::*;
    use bridge_traits::error::BridgeError;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        value: u32,
    }

    fn http(mock: MockHttpClient) -> ProviderHttp {
        let config = ProviderApiConfig::new().with_rate_limit_delay_ms(0);
        ProviderHttp::new(MediaProvider::YouTube, Arc::new(mock), &config)
    }

    #[test]
    fn test_status_mapping() {
        let provider = MediaProvider::SoundCloud;
        assert!(matches!(
            status_error(provider, &json_response(401, "")),
            MediaError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(provider, &json_response(403, "")),
            MediaError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(provider, &json_response(404, "")),
            MediaError::NotFound(_)
        ));
        assert!(matches!(
            status_error(provider, &json_response(503, "")),
            MediaError::Network(_)
        ));

        let mut limited = json_response(429, "");
        limited.headers.insert("Retry-After".into(), "3".into());
        match status_error(provider, &limited) {
            MediaError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(3)))
            }
            other => panic!("unexpected {:?}", other),
        }

        match status_error(provider, &json_response(400, "{\"error\":\"bad\"}")) {
            MediaError::RemoteApi { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "{\"error\":\"bad\"}");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_json_sets_headers_and_decodes() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                request.headers.get("User-Agent").map(String::as_str) == Some(USER_AGENT)
                    && request.timeout == Some(Duration::from_secs(15))
            })
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"value": 7}"#)));

        let payload: Payload = http(mock)
            .get_json(HttpRequest::get("https://api.example.com/v1"))
            .await
            .unwrap();
        assert_eq!(payload.value, 7);
    }

    #[tokio::test]
    async fn test_decode_failure_is_parse_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(json_response(200, "<html>")));

        let err = http(mock)
            .get_json::<Payload>(HttpRequest::get("https://api.example.com/v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Parse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Err(BridgeError::Connection("refused".into())));

        let err = http(mock)
            .send(HttpRequest::get("https://api.example.com/v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Network(_)));
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let mut limiter = RateLimiter::new(Duration::from_millis(200));
        let start = tokio::time::Instant::now();

        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;

        assert!(limiter.last_request.is_some());
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_registry_routing() {
        struct Fixed(MediaProvider);

        #[async_trait]
        impl MediaResolver for Fixed {
            fn provider(&self) -> MediaProvider {
                self.0
            }

            async fn update_media(
                &self,
                _message: &Message,
                fragment: &ContentFragment,
            ) -> Result<ContentFragment> {
                Ok(fragment.clone())
            }
        }

        let mut registry = ResolverRegistry::new()
            .with_resolver(Arc::new(Fixed(MediaProvider::Spotify)))
            .with_resolver(Arc::new(Fixed(MediaProvider::YouTube)));

        assert_eq!(
            registry.providers(),
            vec![MediaProvider::YouTube, MediaProvider::Spotify]
        );
        assert!(registry.get(MediaProvider::GoogleMaps).is_none());
        assert!(registry
            .register(Arc::new(Fixed(MediaProvider::Spotify)))
            .is_some());
        assert_eq!(registry.len(), 2);
        assert!(registry.get(MediaProvider::Spotify).unwrap().streaming().is_none());
    }
}
