//! # Core Configuration Module
//!
//! Configuration for the rich-media sync core.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] holding the host bridges, provider
//! credentials, feature flags and sync tuning. `build()` validates everything
//! and fails fast with an actionable message when a capability is missing or
//! a provider is enabled without the credentials it needs.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - provider API access (desktop default: reqwest, injected
//!   with the `desktop-shims` feature)
//!
//! ## Optional Dependencies
//!
//! - `SyncDispatcher` - durable job queue supplied by the host. Without one,
//!   the service runs an in-process queue.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ProviderApiConfig};
//!
//! let config = CoreConfig::builder()
//!     .provider_api_config(ProviderApiConfig::from_env()?)
//!     .enable_youtube(true)
//!     .enable_google_maps(true)
//!     .enable_streaming(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: YouTube is enabled but no API key was configured
//! let err = CoreConfig::builder()
//!     .http_client(client)
//!     .enable_youtube(true)
//!     .build()
//!     .unwrap_err();
//! assert!(err.to_string().contains("YouTube"));
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, SyncDispatcher};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default base URL of the Google Static Maps API.
pub const DEFAULT_STATIC_MAP_BASE_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";

const ENV_PREFIX: &str = "RICHMEDIA_";

/// Core configuration for the rich-media sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client used by every provider resolver
    pub http_client: Arc<dyn HttpClient>,

    /// Host job queue for sync work (optional)
    pub sync_dispatcher: Option<Arc<dyn SyncDispatcher>>,

    pub features: FeatureFlags,

    /// Provider API credentials and endpoints
    pub provider_api_config: ProviderApiConfig,

    pub sync_settings: SyncSettings,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field(
                "sync_dispatcher",
                &self
                    .sync_dispatcher
                    .as_ref()
                    .map(|_| "SyncDispatcher { ... }"),
            )
            .field("features", &self.features)
            .field("provider_api_config", &self.provider_api_config)
            .field("sync_settings", &self.sync_settings)
            .finish()
    }
}

/// Feature flags control which providers are active.
///
/// A disabled provider has no registered resolver: its fragments resolve to
/// an `Unsupported` error descriptor and keep their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Resolve YouTube video metadata (requires an API key)
    pub enable_youtube: bool,

    /// Resolve SoundCloud tracks and playlists (requires a client id)
    pub enable_soundcloud: bool,

    /// Resolve Spotify tracks, albums, playlists and artists
    /// (requires client credentials)
    pub enable_spotify: bool,

    /// Resolve map locations; reverse geocoding needs an API key but the
    /// preview works without one
    pub enable_google_maps: bool,

    /// Allow `prepare_streaming` to reach provider streaming endpoints
    pub enable_streaming: bool,
}

impl FeatureFlags {
    /// Every provider and streaming enabled.
    pub fn all() -> Self {
        Self {
            enable_youtube: true,
            enable_soundcloud: true,
            enable_spotify: true,
            enable_google_maps: true,
            enable_streaming: true,
        }
    }
}

/// Credentials and endpoints for the media provider APIs.
///
/// # Security Note
///
/// Keys must never be hardcoded in the binary. Load them with
/// [`ProviderApiConfig::from_env`] or inject them from the host's secure
/// configuration. The `Debug` implementation never prints secret values.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderApiConfig {
    /// YouTube Data API v3 key
    pub youtube_api_key: Option<String>,

    /// SoundCloud application client id
    pub soundcloud_client_id: Option<String>,

    /// Spotify application client id (client-credentials flow)
    pub spotify_client_id: Option<String>,

    /// Spotify application client secret
    pub spotify_client_secret: Option<String>,

    /// Google Maps Platform key used for reverse geocoding and appended to
    /// static-map previews at render time
    pub google_maps_api_key: Option<String>,

    /// Base URL for static-map previews
    pub static_map_base_url: String,

    /// Minimum delay between two requests to the same provider
    ///
    /// Default: 200ms
    pub rate_limit_delay_ms: u64,

    /// Per-request timeout in seconds
    ///
    /// Default: 15s
    pub request_timeout_secs: u64,
}

impl Default for ProviderApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "[REDACTED]")
        }

        f.debug_struct("ProviderApiConfig")
            .field("youtube_api_key", &mask(&self.youtube_api_key))
            .field("soundcloud_client_id", &mask(&self.soundcloud_client_id))
            .field("spotify_client_id", &mask(&self.spotify_client_id))
            .field("spotify_client_secret", &mask(&self.spotify_client_secret))
            .field("google_maps_api_key", &mask(&self.google_maps_api_key))
            .field("static_map_base_url", &self.static_map_base_url)
            .field("rate_limit_delay_ms", &self.rate_limit_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ProviderApiConfig {
    /// Creates a config with no credentials configured
    pub fn new() -> Self {
        Self {
            youtube_api_key: None,
            soundcloud_client_id: None,
            spotify_client_id: None,
            spotify_client_secret: None,
            google_maps_api_key: None,
            static_map_base_url: DEFAULT_STATIC_MAP_BASE_URL.to_string(),
            rate_limit_delay_ms: 200,
            request_timeout_secs: 15,
        }
    }

    /// Loads credentials from `RICHMEDIA_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `RICHMEDIA_YOUTUBE_API_KEY` | `youtube_api_key` |
    /// | `RICHMEDIA_SOUNDCLOUD_CLIENT_ID` | `soundcloud_client_id` |
    /// | `RICHMEDIA_SPOTIFY_CLIENT_ID` | `spotify_client_id` |
    /// | `RICHMEDIA_SPOTIFY_CLIENT_SECRET` | `spotify_client_secret` |
    /// | `RICHMEDIA_GOOGLE_MAPS_API_KEY` | `google_maps_api_key` |
    /// | `RICHMEDIA_STATIC_MAP_BASE_URL` | `static_map_base_url` |
    /// | `RICHMEDIA_RATE_LIMIT_DELAY_MS` | `rate_limit_delay_ms` |
    /// | `RICHMEDIA_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` |
    ///
    /// Unset or empty variables keep the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEnv`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from an arbitrary
    /// lookup function. `lookup` receives the full variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let parse_u64 = |suffix: &str, default: u64| -> Result<u64> {
            match read(suffix) {
                Some(raw) => raw.parse::<u64>().map_err(|e| Error::InvalidEnv {
                    variable: format!("{}{}", ENV_PREFIX, suffix),
                    message: e.to_string(),
                }),
                None => Ok(default),
            }
        };

        let defaults = Self::new();
        Ok(Self {
            youtube_api_key: read("YOUTUBE_API_KEY"),
            soundcloud_client_id: read("SOUNDCLOUD_CLIENT_ID"),
            spotify_client_id: read("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: read("SPOTIFY_CLIENT_SECRET"),
            google_maps_api_key: read("GOOGLE_MAPS_API_KEY"),
            static_map_base_url: read("STATIC_MAP_BASE_URL")
                .unwrap_or(defaults.static_map_base_url),
            rate_limit_delay_ms: parse_u64("RATE_LIMIT_DELAY_MS", defaults.rate_limit_delay_ms)?,
            request_timeout_secs: parse_u64(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
        })
    }

    pub fn with_youtube_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.youtube_api_key = Some(api_key.into());
        self
    }

    pub fn with_soundcloud_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.soundcloud_client_id = Some(client_id.into());
        self
    }

    pub fn with_spotify_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.spotify_client_id = Some(client_id.into());
        self.spotify_client_secret = Some(client_secret.into());
        self
    }

    pub fn with_google_maps_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.google_maps_api_key = Some(api_key.into());
        self
    }

    pub fn with_static_map_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.static_map_base_url = base_url.into();
        self
    }

    pub fn with_rate_limit_delay_ms(mut self, delay_ms: u64) -> Self {
        self.rate_limit_delay_ms = delay_ms;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let credentials = [
            ("YouTube API key", &self.youtube_api_key),
            ("SoundCloud client id", &self.soundcloud_client_id),
            ("Spotify client id", &self.spotify_client_id),
            ("Spotify client secret", &self.spotify_client_secret),
            ("Google Maps API key", &self.google_maps_api_key),
        ];
        for (name, value) in credentials {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            return Err(Error::Config(
                "Spotify requires both a client id and a client secret".to_string(),
            ));
        }

        match url::Url::parse(&self.static_map_base_url) {
            Ok(url) if url.scheme() == "https" || url.scheme() == "http" => {}
            _ => {
                return Err(Error::Config(format!(
                    "Static map base URL must be an http(s) URL: {}",
                    self.static_map_base_url
                )))
            }
        }

        if self.rate_limit_delay_ms > 60_000 {
            return Err(Error::Config(
                "Rate limit delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(Error::Config(
                "Request timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn has_youtube(&self) -> bool {
        self.youtube_api_key.is_some()
    }

    pub fn has_soundcloud(&self) -> bool {
        self.soundcloud_client_id.is_some()
    }

    pub fn has_spotify(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }

    pub fn has_geocoding(&self) -> bool {
        self.google_maps_api_key.is_some()
    }
}

/// Tuning for the sync worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Resolutions allowed to run at the same time
    pub max_concurrent_resolutions: usize,

    /// How many times a round whose errors were all transient is re-run
    pub max_retries: u32,

    /// Delay before the first re-run; doubles on each further attempt
    pub base_retry_delay_ms: u64,

    /// Event bus buffer per subscriber
    pub event_buffer_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrent_resolutions: 4,
            max_retries: 3,
            base_retry_delay_ms: 500,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl SyncSettings {
    /// Backoff before re-run `attempt` (1-based), capped at one minute.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_retry_delay_ms.saturating_mul(factor).min(60_000))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_resolutions == 0 || self.max_concurrent_resolutions > 64 {
            return Err(Error::Config(
                "Max concurrent resolutions must be between 1 and 64".to_string(),
            ));
        }

        if self.max_retries > 10 {
            return Err(Error::Config(
                "Max retries exceeds maximum of 10".to_string(),
            ));
        }

        if self.base_retry_delay_ms > 60_000 {
            return Err(Error::Config(
                "Base retry delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// Checks the nested configs and that every enabled provider has the
    /// credentials it needs.
    pub fn validate(&self) -> Result<()> {
        self.provider_api_config.validate()?;
        self.sync_settings.validate()?;

        let api = &self.provider_api_config;

        if self.features.enable_youtube && !api.has_youtube() {
            return Err(Error::Config(
                "YouTube enabled but no API key provided. \
                 Set RICHMEDIA_YOUTUBE_API_KEY or disable the provider."
                    .to_string(),
            ));
        }

        if self.features.enable_soundcloud && !api.has_soundcloud() {
            return Err(Error::Config(
                "SoundCloud enabled but no client id provided. \
                 Set RICHMEDIA_SOUNDCLOUD_CLIENT_ID or disable the provider."
                    .to_string(),
            ));
        }

        if self.features.enable_spotify && !api.has_spotify() {
            return Err(Error::Config(
                "Spotify enabled but client credentials are incomplete. \
                 Set RICHMEDIA_SPOTIFY_CLIENT_ID and RICHMEDIA_SPOTIFY_CLIENT_SECRET \
                 or disable the provider."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach media provider APIs. \
                  Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                  Mobile: inject an adapter over the platform networking stack."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    sync_dispatcher: Option<Arc<dyn SyncDispatcher>>,
    features: FeatureFlags,
    provider_api_config: Option<ProviderApiConfig>,
    sync_settings: Option<SyncSettings>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn sync_dispatcher(mut self, dispatcher: Arc<dyn SyncDispatcher>) -> Self {
        self.sync_dispatcher = Some(dispatcher);
        self
    }

    pub fn enable_youtube(mut self, enabled: bool) -> Self {
        self.features.enable_youtube = enabled;
        self
    }

    pub fn enable_soundcloud(mut self, enabled: bool) -> Self {
        self.features.enable_soundcloud = enabled;
        self
    }

    pub fn enable_spotify(mut self, enabled: bool) -> Self {
        self.features.enable_spotify = enabled;
        self
    }

    pub fn enable_google_maps(mut self, enabled: bool) -> Self {
        self.features.enable_google_maps = enabled;
        self
    }

    pub fn enable_streaming(mut self, enabled: bool) -> Self {
        self.features.enable_streaming = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn provider_api_config(mut self, config: ProviderApiConfig) -> Self {
        self.provider_api_config = Some(config);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync_settings = Some(settings);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no `HttpClient` was provided and no
    ///   platform default is available
    /// - [`Error::Config`] when validation fails
    pub fn build(self) -> Result<CoreConfig> {
        let provider_api_config = self.provider_api_config.unwrap_or_default();

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(provider_api_config.request_timeout())?,
        };

        let config = CoreConfig {
            http_client,
            sync_dispatcher: self.sync_dispatcher,
            features: self.features,
            provider_api_config,
            sync_settings: self.sync_settings.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
