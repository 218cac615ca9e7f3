//! Spotify Web API resolver
//!
//! Authenticates as the application with the client-credentials flow. The
//! access token is cached until shortly before it expires and refreshed once
//! when the API rejects it. Streaming is limited to the 30 second previews
//! the Web API exposes.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpRequest};
use chrono::Utc;
use core_messages::{
    ContentFragment, MediaAsset, MediaInfo, MediaProvider, Message, SpotifyKind, SpotifyMedia,
    TrackSummary,
};
use core_runtime::config::ProviderApiConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{ensure_asset, ensure_provider, MediaResolver, ProviderHttp, StreamingResolver};
use crate::error::{MediaError, Result};

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Market used for artist top tracks
const TOP_TRACKS_MARKET: &str = "US";

/// Refresh tokens this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on a cached token's lifetime, whatever the endpoint reports
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub struct SpotifyResolver {
    http: ProviderHttp,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    token: Mutex<Option<AccessToken>>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    /// Null for local files in playlists
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    album: Option<AlbumRef>,
    duration_ms: Option<u64>,
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    images: Vec<Image>,
    tracks: Option<Page<TrackObject>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistOwner {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
    name: String,
    owner: Option<PlaylistOwner>,
    #[serde(default)]
    images: Vec<Image>,
    tracks: Option<Page<PlaylistItem>>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct TopTracks {
    #[serde(default)]
    tracks: Vec<TrackObject>,
}

fn artist_names(artists: &[ArtistRef]) -> Option<String> {
    if artists.is_empty() {
        None
    } else {
        Some(
            artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

fn first_image(images: Vec<Image>) -> Option<String> {
    images.into_iter().next().map(|i| i.url)
}

fn summaries(tracks: impl IntoIterator<Item = TrackObject>) -> Vec<TrackSummary> {
    tracks
        .into_iter()
        .filter_map(|track| {
            let artist = artist_names(&track.artists);
            Some(TrackSummary {
                id: track.id?,
                title: track.name,
                artist,
                duration_ms: track.duration_ms,
                preview_url: track.preview_url,
            })
        })
        .collect()
}

fn total_duration(tracks: &[TrackSummary]) -> Option<u64> {
    if tracks.is_empty() {
        None
    } else {
        Some(tracks.iter().filter_map(|t| t.duration_ms).sum())
    }
}

// =============================================================================
// Resolver
// =============================================================================

impl SpotifyResolver {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        config: &ProviderApiConfig,
    ) -> Self {
        Self {
            http: ProviderHttp::new(MediaProvider::Spotify, http_client, config),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: SPOTIFY_API_BASE.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &ProviderApiConfig) -> Result<Self> {
        match (&config.spotify_client_id, &config.spotify_client_secret) {
            (Some(id), Some(secret)) => Ok(Self::new(http_client, id, secret, config)),
            _ => Err(MediaError::NotConfigured(
                "Spotify client credentials".to_string(),
            )),
        }
    }

    pub fn with_endpoints(
        mut self,
        api_base: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.token_url = token_url.into();
        self
    }

    /// Cached app token, fetching a new one when missing or near expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let request = HttpRequest::post(&self.token_url)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")]);

        let response: TokenResponse = self.http.get_json(request).await?;
        info!(expires_in = response.expires_in, "Obtained Spotify access token");

        let value = response.access_token;
        let lifetime = Duration::from_secs(response.expires_in).min(MAX_TOKEN_LIFETIME);
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        self.token.lock().await.take();
    }

    /// GET an API path with the app token, retrying once with a fresh token
    /// when the current one is rejected.
    async fn api_get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let build = |token: &str| {
            query.iter().fold(
                HttpRequest::get(format!("{}/{}", self.api_base, path)).bearer_token(token),
                |request, (key, value)| request.query(key, value),
            )
        };

        let token = self.access_token().await?;
        match self.http.get_json(build(&token)).await {
            Err(MediaError::Unauthorized(detail)) => {
                warn!(%detail, "Spotify rejected access token, refreshing");
                self.invalidate_token().await;
                let token = self.access_token().await?;
                self.http.get_json(build(&token)).await
            }
            result => result,
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self, kind: SpotifyKind, id: &str) -> Result<SpotifyMedia> {
        let media = match kind {
            SpotifyKind::Track => {
                let track: TrackObject = self.api_get(&format!("tracks/{}", id), &[]).await?;
                let (album, artwork_url) = match track.album {
                    Some(album) => (Some(album.name), first_image(album.images)),
                    None => (None, None),
                };
                SpotifyMedia {
                    kind,
                    id: track.id.unwrap_or_else(|| id.to_string()),
                    artist: artist_names(&track.artists),
                    title: track.name,
                    album,
                    artwork_url,
                    duration_ms: track.duration_ms,
                    preview_url: track.preview_url,
                    tracks: Vec::new(),
                    refreshed_at: Utc::now(),
                }
            }
            SpotifyKind::Album => {
                let album: AlbumObject = self.api_get(&format!("albums/{}", id), &[]).await?;
                let tracks = summaries(album.tracks.map(|p| p.items).unwrap_or_default());
                SpotifyMedia {
                    kind,
                    id: album.id,
                    artist: artist_names(&album.artists),
                    album: Some(album.name.clone()),
                    title: album.name,
                    artwork_url: first_image(album.images),
                    duration_ms: total_duration(&tracks),
                    preview_url: None,
                    tracks,
                    refreshed_at: Utc::now(),
                }
            }
            SpotifyKind::Playlist => {
                let playlist: PlaylistObject =
                    self.api_get(&format!("playlists/{}", id), &[]).await?;
                let items = playlist.tracks.map(|p| p.items).unwrap_or_default();
                let tracks = summaries(items.into_iter().filter_map(|item| item.track));
                SpotifyMedia {
                    kind,
                    id: playlist.id,
                    title: playlist.name,
                    artist: playlist.owner.and_then(|o| o.display_name),
                    album: None,
                    artwork_url: first_image(playlist.images),
                    duration_ms: total_duration(&tracks),
                    preview_url: None,
                    tracks,
                    refreshed_at: Utc::now(),
                }
            }
            SpotifyKind::Artist => {
                let artist: ArtistObject = self.api_get(&format!("artists/{}", id), &[]).await?;
                let top: TopTracks = self
                    .api_get(
                        &format!("artists/{}/top-tracks", id),
                        &[("market", TOP_TRACKS_MARKET)],
                    )
                    .await?;
                SpotifyMedia {
                    kind,
                    id: artist.id,
                    artist: Some(artist.name.clone()),
                    title: artist.name,
                    album: None,
                    artwork_url: first_image(artist.images),
                    duration_ms: None,
                    preview_url: None,
                    tracks: summaries(top.tracks),
                    refreshed_at: Utc::now(),
                }
            }
        };

        debug!(title = %media.title, tracks = media.tracks.len(), "Fetched Spotify media");
        Ok(media)
    }
}

/// Kind and id from a `spotify:` URI or an `open.spotify.com` link.
pub fn parse_spotify_reference(payload: &str) -> Option<(SpotifyKind, String)> {
    let payload = payload.trim();

    let (kind, id) = if let Some(rest) = payload.strip_prefix("spotify:") {
        // Legacy user playlists: spotify:user:{user}:playlist:{id}
        let mut segments = rest.rsplit(':');
        let id = segments.next()?;
        let kind = segments.next()?;
        (kind.to_string(), id.to_string())
    } else {
        let url = Url::parse(payload).ok()?;
        match url.host_str()? {
            "open.spotify.com" | "play.spotify.com" => {}
            _ => return None,
        }
        let mut segments = url
            .path_segments()?
            .filter(|s| !s.is_empty() && *s != "embed" && !s.starts_with("intl-"));
        let kind = segments.next()?;
        let id = segments.next()?;
        (kind.to_string(), id.to_string())
    };

    let kind = SpotifyKind::parse(&kind)?;
    let valid_id = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric());
    valid_id.then_some((kind, id))
}

#[async_trait]
impl MediaResolver for SpotifyResolver {
    fn provider(&self) -> MediaProvider {
        MediaProvider::Spotify
    }

    async fn update_media(
        &self,
        _message: &Message,
        fragment: &ContentFragment,
    ) -> Result<ContentFragment> {
        ensure_provider(MediaProvider::Spotify, fragment)?;

        let (kind, id) = parse_spotify_reference(&fragment.content).ok_or_else(|| {
            MediaError::InvalidReference(format!("'{}' is not a Spotify link", fragment.content))
        })?;

        let media = self.fetch(kind, &id).await?;
        Ok(fragment.clone().with_media(MediaInfo::Spotify(media)))
    }

    fn streaming(&self) -> Option<&dyn StreamingResolver> {
        Some(self)
    }
}

#[async_trait]
impl StreamingResolver for SpotifyResolver {
    #[instrument(skip(self, asset), fields(asset = %asset))]
    async fn prepare_streaming(&self, asset: &MediaAsset) -> Result<Vec<Url>> {
        ensure_asset(MediaProvider::Spotify, asset)?;

        let (kind, id) = parse_spotify_reference(asset.reference()).ok_or_else(|| {
            MediaError::InvalidReference(format!("Spotify asset '{}'", asset.reference()))
        })?;
        let media = self.fetch(kind, &id).await?;

        let previews: Vec<String> = match kind {
            SpotifyKind::Track => media.preview_url.into_iter().collect(),
            _ => media
                .tracks
                .into_iter()
                .filter_map(|t| t.preview_url)
                .collect(),
        };

        previews
            .iter()
            .map(|raw| {
                Url::parse(raw).map_err(|e| MediaError::Parse(format!("Spotify preview URL: {}", e)))
            })
            .collect()
    }
}
