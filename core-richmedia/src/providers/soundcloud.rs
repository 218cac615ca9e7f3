//! SoundCloud resolver
//!
//! Metadata comes from the `/resolve` endpoint, which accepts any public
//! permalink. Streaming goes through `tracks/{id}/streams`; playlists are
//! expanded track by track in playlist order.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use chrono::Utc;
use core_messages::{
    ContentFragment, MediaAsset, MediaInfo, MediaProvider, Message, SoundCloudKind,
    SoundCloudMedia, TrackSummary,
};
use core_runtime::config::ProviderApiConfig;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{ensure_asset, ensure_provider, MediaResolver, ProviderHttp, StreamingResolver};
use crate::error::{MediaError, Result};

const SOUNDCLOUD_API_BASE: &str = "https://api.soundcloud.com";

pub struct SoundCloudResolver {
    http: ProviderHttp,
    client_id: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ResolvedResource {
    kind: String,
    id: u64,
    #[serde(default)]
    title: String,
    user: Option<User>,
    artwork_url: Option<String>,
    duration: Option<u64>,
    permalink_url: Option<String>,
    #[serde(default)]
    tracks: Vec<TrackResource>,
}

#[derive(Debug, Deserialize)]
struct User {
    username: String,
}

#[derive(Debug, Deserialize)]
struct TrackResource {
    id: u64,
    #[serde(default)]
    title: String,
    user: Option<User>,
    duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    #[serde(default)]
    tracks: Vec<TrackResource>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackStreams {
    http_mp3_128_url: Option<String>,
    hls_mp3_128_url: Option<String>,
    preview_mp3_128_url: Option<String>,
}

impl TrackStreams {
    /// Progressive MP3 first, then HLS, then the preview clip.
    fn preferred(self) -> Option<String> {
        self.http_mp3_128_url
            .or(self.hls_mp3_128_url)
            .or(self.preview_mp3_128_url)
    }
}

impl SoundCloudResolver {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        client_id: impl Into<String>,
        config: &ProviderApiConfig,
    ) -> Self {
        Self {
            http: ProviderHttp::new(MediaProvider::SoundCloud, http_client, config),
            client_id: client_id.into(),
            api_base: SOUNDCLOUD_API_BASE.to_string(),
        }
    }

    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &ProviderApiConfig) -> Result<Self> {
        let client_id = config
            .soundcloud_client_id
            .clone()
            .ok_or_else(|| MediaError::NotConfigured("SoundCloud client id".to_string()))?;
        Ok(Self::new(http_client, client_id, config))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(format!("{}/{}", self.api_base, path)).query("client_id", &self.client_id)
    }

    #[instrument(skip(self))]
    async fn resolve_permalink(&self, permalink: &str) -> Result<SoundCloudMedia> {
        let request = self.request("resolve").query("url", permalink);
        let resource: ResolvedResource = self.http.get_json(request).await?;

        let kind = match resource.kind.as_str() {
            "track" => SoundCloudKind::Track,
            "playlist" => SoundCloudKind::Playlist,
            other => {
                return Err(MediaError::InvalidReference(format!(
                    "SoundCloud {} is neither a track nor a playlist",
                    other
                )))
            }
        };

        debug!(id = resource.id, kind = ?kind, "Resolved SoundCloud permalink");

        Ok(SoundCloudMedia {
            kind,
            id: resource.id,
            title: resource.title,
            artist: resource.user.map(|u| u.username),
            artwork_url: resource.artwork_url,
            duration_ms: resource.duration,
            permalink_url: resource
                .permalink_url
                .unwrap_or_else(|| permalink.to_string()),
            tracks: resource.tracks.into_iter().map(track_summary).collect(),
            refreshed_at: Utc::now(),
        })
    }

    async fn track_stream(&self, track_id: u64) -> Result<Option<Url>> {
        let streams: TrackStreams = self
            .http
            .get_json(self.request(&format!("tracks/{}/streams", track_id)))
            .await?;

        match streams.preferred() {
            Some(raw) => Url::parse(&raw)
                .map(Some)
                .map_err(|e| MediaError::Parse(format!("SoundCloud stream URL: {}", e))),
            None => Ok(None),
        }
    }

    async fn playlist_track_ids(&self, playlist_id: u64) -> Result<Vec<u64>> {
        let playlist: PlaylistResource = self
            .http
            .get_json(self.request(&format!("playlists/{}", playlist_id)))
            .await?;
        Ok(playlist.tracks.into_iter().map(|t| t.id).collect())
    }
}

fn track_summary(track: TrackResource) -> TrackSummary {
    TrackSummary {
        id: track.id.to_string(),
        title: track.title,
        artist: track.user.map(|u| u.username),
        duration_ms: track.duration,
        preview_url: None,
    }
}

/// Split an asset reference of the form `tracks/{id}` or `playlists/{id}`.
fn parse_reference(reference: &str) -> Result<(SoundCloudKind, u64)> {
    let invalid = || MediaError::InvalidReference(format!("SoundCloud asset '{}'", reference));

    let (collection, id) = reference.split_once('/').ok_or_else(invalid)?;
    let kind = match collection {
        "tracks" => SoundCloudKind::Track,
        "playlists" => SoundCloudKind::Playlist,
        _ => return Err(invalid()),
    };
    let id = id.parse().map_err(|_| invalid())?;
    Ok((kind, id))
}

#[async_trait]
impl MediaResolver for SoundCloudResolver {
    fn provider(&self) -> MediaProvider {
        MediaProvider::SoundCloud
    }

    async fn update_media(
        &self,
        _message: &Message,
        fragment: &ContentFragment,
    ) -> Result<ContentFragment> {
        ensure_provider(MediaProvider::SoundCloud, fragment)?;

        let permalink = fragment.content.trim();
        if !(permalink.starts_with("https://") || permalink.starts_with("http://")) {
            return Err(MediaError::InvalidReference(format!(
                "'{}' is not a SoundCloud permalink",
                permalink
            )));
        }

        let media = self.resolve_permalink(permalink).await?;
        Ok(fragment.clone().with_media(MediaInfo::SoundCloud(media)))
    }

    fn streaming(&self) -> Option<&dyn StreamingResolver> {
        Some(self)
    }
}

#[async_trait]
impl StreamingResolver for SoundCloudResolver {
    #[instrument(skip(self, asset), fields(asset = %asset))]
    async fn prepare_streaming(&self, asset: &MediaAsset) -> Result<Vec<Url>> {
        ensure_asset(MediaProvider::SoundCloud, asset)?;

        let (kind, id) = parse_reference(asset.reference())?;
        let track_ids = match kind {
            SoundCloudKind::Track => vec![id],
            SoundCloudKind::Playlist => self.playlist_track_ids(id).await?,
        };

        let mut urls = Vec::with_capacity(track_ids.len());
        for track_id in track_ids {
            match self.track_stream(track_id).await {
                Ok(Some(url)) => urls.push(url),
                Ok(None) => debug!(track_id, "SoundCloud track has no stream"),
                // One unplayable entry must not hide the rest of a playlist
                Err(e) if kind == SoundCloudKind::Playlist && !e.is_transient() => {
                    warn!(track_id, error = %e, "Skipping SoundCloud playlist entry")
                }
                Err(e) => return Err(e),
            }
        }

        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{json_response, MockHttpClient};
    use super::*;

    const TRACK_RESPONSE: &str = r#"{
        "kind": "track",
        "id": 123,
        "title": "Night Drive",
        "user": {"username": "synthwave"},
        "artwork_url": "https://i1.sndcdn.com/artworks-123-large.jpg",
        "duration": 245000,
        "permalink_url": "https://soundcloud.com/synthwave/night-drive"
    }"#;

    const PLAYLIST_RESPONSE: &str = r#"{
        "kind": "playlist",
        "id": 456,
        "title": "Late Hours",
        "user": {"username": "synthwave"},
        "duration": 490000,
        "permalink_url": "https://soundcloud.com/synthwave/sets/late-hours",
        "tracks": [
            {"id": 1, "title": "One", "user": {"username": "a"}, "duration": 245000},
            {"id": 2, "title": "Two", "duration": 245000}
        ]
    }"#;

    fn config() -> ProviderApiConfig {
        ProviderApiConfig::new()
            .with_soundcloud_client_id("sc-client")
            .with_rate_limit_delay_ms(0)
    }

    fn resolver(mock: MockHttpClient) -> SoundCloudResolver {
        SoundCloudResolver::from_config(Arc::new(mock), &config()).unwrap()
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_reference("tracks/12").unwrap(), (SoundCloudKind::Track, 12));
        assert_eq!(
            parse_reference("playlists/34").unwrap(),
            (SoundCloudKind::Playlist, 34)
        );
        assert!(parse_reference("users/1").is_err());
        assert!(parse_reference("tracks/abc").is_err());
        assert!(parse_reference("tracks").is_err());
    }

    #[tokio::test]
    async fn test_update_media_track() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                request.url.starts_with("https://api.soundcloud.com/resolve?")
                    && request.url.contains("client_id=sc-client")
                    && request
                        .url
                        .contains("url=https%3A%2F%2Fsoundcloud.com%2Fsynthwave%2Fnight-drive")
            })
            .times(1)
            .returning(|_| Ok(json_response(200, TRACK_RESPONSE)));

        let message = Message::rich_media("c-1", "https://soundcloud.com/synthwave/night-drive");
        let updated = resolver(mock)
            .update_media(&message, &message.content[0])
            .await
            .unwrap();

        match updated.media {
            Some(MediaInfo::SoundCloud(media)) => {
                assert_eq!(media.kind, SoundCloudKind::Track);
                assert_eq!(media.id, 123);
                assert_eq!(media.artist.as_deref(), Some("synthwave"));
                assert_eq!(media.duration_ms, Some(245000));
                assert!(media.tracks.is_empty());
            }
            other => panic!("unexpected media {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_media_playlist_keeps_track_order() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(json_response(200, PLAYLIST_RESPONSE)));

        let message =
            Message::rich_media("c-1", "https://soundcloud.com/synthwave/sets/late-hours");
        let updated = resolver(mock)
            .update_media(&message, &message.content[0])
            .await
            .unwrap();

        let Some(MediaInfo::SoundCloud(media)) = updated.media else {
            panic!("expected SoundCloud media");
        };
        assert_eq!(media.kind, SoundCloudKind::Playlist);
        let titles: Vec<_> = media.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two"]);
        assert_eq!(media.tracks[1].artist, None);
        assert_eq!(
            MediaInfo::SoundCloud(media).asset().reference(),
            "playlists/456"
        );
    }

    #[tokio::test]
    async fn test_user_profile_is_invalid_reference() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().returning(|_| {
            Ok(json_response(
                200,
                r#"{"kind": "user", "id": 9, "permalink_url": "https://soundcloud.com/x"}"#,
            ))
        });

        let message = Message::rich_media("c-1", "https://soundcloud.com/x");
        let err = resolver(mock)
            .update_media(&message, &message.content[0])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_track_stream_prefers_progressive() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| request.url.contains("/tracks/123/streams?"))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{
                        "http_mp3_128_url": "https://cf-media.sndcdn.com/123.mp3",
                        "hls_mp3_128_url": "https://cf-hls-media.sndcdn.com/123.m3u8"
                    }"#,
                ))
            });

        let urls = resolver(mock)
            .prepare_streaming(&MediaAsset::new(MediaProvider::SoundCloud, "tracks/123"))
            .await
            .unwrap();
        assert_eq!(urls, vec![Url::parse("https://cf-media.sndcdn.com/123.mp3").unwrap()]);
    }

    #[tokio::test]
    async fn test_playlist_stream_expands_in_order() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().returning(|request| {
            let body = if request.url.contains("/playlists/456?") {
                PLAYLIST_RESPONSE
            } else if request.url.contains("/tracks/1/streams") {
                r#"{"hls_mp3_128_url": "https://hls.example/1.m3u8"}"#
            } else if request.url.contains("/tracks/2/streams") {
                r#"{"preview_mp3_128_url": "https://preview.example/2.mp3"}"#
            } else {
                return Ok(json_response(404, ""));
            };
            Ok(json_response(200, body))
        });

        let urls = resolver(mock)
            .prepare_streaming(&MediaAsset::new(MediaProvider::SoundCloud, "playlists/456"))
            .await
            .unwrap();

        let urls: Vec<_> = urls.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            ["https://hls.example/1.m3u8", "https://preview.example/2.mp3"]
        );
    }

    #[tokio::test]
    async fn test_playlist_skips_unavailable_entries() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().returning(|request| {
            if request.url.contains("/playlists/456?") {
                Ok(json_response(200, PLAYLIST_RESPONSE))
            } else if request.url.contains("/tracks/1/streams") {
                Ok(json_response(404, ""))
            } else {
                Ok(json_response(
                    200,
                    r#"{"http_mp3_128_url": "https://cdn.example/2.mp3"}"#,
                ))
            }
        });

        let urls = resolver(mock)
            .prepare_streaming(&MediaAsset::new(MediaProvider::SoundCloud, "playlists/456"))
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_asset_rejected() {
        let err = resolver(MockHttpClient::new())
            .prepare_streaming(&MediaAsset::new(MediaProvider::Spotify, "tracks/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidReference(_)));
    }
}
