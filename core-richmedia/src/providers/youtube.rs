//! YouTube Data API v3 resolver

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use chrono::Utc;
use core_messages::{ContentFragment, MediaInfo, MediaProvider, Message, YouTubeVideo};
use core_runtime::config::ProviderApiConfig;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

use super::{ensure_provider, MediaResolver, ProviderHttp};
use crate::error::{MediaError, Result};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

pub struct YouTubeResolver {
    http: ProviderHttp,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    maxres: Option<Thumbnail>,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.maxres
            .or(self.standard)
            .or(self.high)
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

impl YouTubeResolver {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        config: &ProviderApiConfig,
    ) -> Self {
        Self {
            http: ProviderHttp::new(MediaProvider::YouTube, http_client, config),
            api_key: api_key.into(),
            api_base: YOUTUBE_API_BASE.to_string(),
        }
    }

    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &ProviderApiConfig) -> Result<Self> {
        let api_key = config
            .youtube_api_key
            .clone()
            .ok_or_else(|| MediaError::NotConfigured("YouTube API key".to_string()))?;
        Ok(Self::new(http_client, api_key, config))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[instrument(skip(self))]
    async fn fetch_video(&self, video_id: &str) -> Result<YouTubeVideo> {
        let request = HttpRequest::get(format!("{}/videos", self.api_base))
            .query("part", "snippet,contentDetails")
            .query("id", video_id)
            .query("key", &self.api_key);

        let response: VideoListResponse = self.http.get_json(request).await?;
        let item = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::NotFound(format!("YouTube video {}", video_id)))?;

        debug!(video_id, title = %item.snippet.title, "Fetched YouTube video");

        Ok(YouTubeVideo {
            video_id: item.id,
            title: item.snippet.title,
            channel_title: item.snippet.channel_title,
            thumbnail_url: item.snippet.thumbnails.best(),
            duration_secs: item
                .content_details
                .and_then(|d| d.duration)
                .and_then(|d| parse_iso8601_duration(&d)),
            published_at: item.snippet.published_at,
            refreshed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl MediaResolver for YouTubeResolver {
    fn provider(&self) -> MediaProvider {
        MediaProvider::YouTube
    }

    async fn update_media(
        &self,
        _message: &Message,
        fragment: &ContentFragment,
    ) -> Result<ContentFragment> {
        ensure_provider(MediaProvider::YouTube, fragment)?;

        let video_id = extract_video_id(&fragment.content).ok_or_else(|| {
            MediaError::InvalidReference(format!("no YouTube video id in '{}'", fragment.content))
        })?;

        let video = self.fetch_video(&video_id).await?;
        Ok(fragment.clone().with_media(MediaInfo::YouTube(video)))
    }
}

/// Video id from a raw id or any of the common YouTube link shapes.
pub fn extract_video_id(payload: &str) -> Option<String> {
    let payload = payload.trim();
    if is_video_id(payload) {
        return Some(payload.to_string());
    }

    let url = Url::parse(payload).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S` or `P1DT30M`.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.strip_prefix('P')?;
    let mut total = 0u64;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' => number.push(c),
            unit => {
                let amount: f64 = number.parse().ok()?;
                number.clear();
                let factor = match (in_time, unit) {
                    (false, 'W') => 604_800.0,
                    (false, 'D') => 86_400.0,
                    (true, 'H') => 3_600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => return None,
                };
                total += (amount * factor) as u64;
                saw_component = true;
            }
        }
    }

    (number.is_empty() && saw_component).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{json_response, MockHttpClient};
    use super::*;
    use core_messages::FragmentKind;

    const VIDEO_RESPONSE: &str = r#"{
        "items": [{
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "title": "Never Gonna Give You Up",
                "channelTitle": "Rick Astley",
                "publishedAt": "2009-10-25T06:57:33Z",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg"},
                    "high": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"}
                }
            },
            "contentDetails": {"duration": "PT3M33S"}
        }]
    }"#;

    fn config() -> ProviderApiConfig {
        ProviderApiConfig::new()
            .with_youtube_api_key("yt-key")
            .with_rate_limit_delay_ms(0)
    }

    fn message() -> Message {
        Message::rich_media("c-1", "https://youtu.be/dQw4w9WgXcQ")
    }

    #[test]
    fn test_extract_video_id() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("id1"), Some("id1".to_string()));
        assert_eq!(extract_video_id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch"), None);
    }

    #[test]
    fn test_extract_video_id_requires_youtube_host() {
        assert_eq!(
            extract_video_id("https://music.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://example.com/embed/dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://notyoutube.com/shorts/dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://example.com/dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT3M33S"), Some(213));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso8601_duration("PT0S"), Some(0));
        assert_eq!(parse_iso8601_duration("P"), None);
        assert_eq!(parse_iso8601_duration("3M"), None);
        assert_eq!(parse_iso8601_duration("PT5"), None);
        assert_eq!(parse_iso8601_duration("P5M"), None);
    }

    #[tokio::test]
    async fn test_update_media_fills_metadata() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                request.url.starts_with("https://www.googleapis.com/youtube/v3/videos?")
                    && request.url.contains("part=snippet%2CcontentDetails")
                    && request.url.contains("id=dQw4w9WgXcQ")
                    && request.url.contains("key=yt-key")
            })
            .times(1)
            .returning(|_| Ok(json_response(200, VIDEO_RESPONSE)));

        let resolver = YouTubeResolver::from_config(Arc::new(mock), &config()).unwrap();
        let message = message();
        let fragment = message.content[0].clone();

        let updated = resolver.update_media(&message, &fragment).await.unwrap();

        assert_eq!(updated.content, fragment.content);
        assert_eq!(message.content[0], fragment);
        match updated.media {
            Some(MediaInfo::YouTube(video)) => {
                assert_eq!(video.title, "Never Gonna Give You Up");
                assert_eq!(video.channel_title.as_deref(), Some("Rick Astley"));
                assert_eq!(
                    video.thumbnail_url.as_deref(),
                    Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
                );
                assert_eq!(video.duration_secs, Some(213));
            }
            other => panic!("unexpected media {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_items_is_not_found() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(json_response(200, r#"{"items": []}"#)));

        let resolver = YouTubeResolver::from_config(Arc::new(mock), &config()).unwrap();
        let message = message();

        let err = resolver
            .update_media(&message, &message.content[0])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_foreign_fragment() {
        let resolver =
            YouTubeResolver::from_config(Arc::new(MockHttpClient::new()), &config()).unwrap();
        let message = message();
        let fragment = ContentFragment::new(FragmentKind::Spotify, "spotify:track:1");

        let err = resolver.update_media(&message, &fragment).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidReference(_)));
    }

    #[test]
    fn test_requires_api_key() {
        let result = YouTubeResolver::from_config(
            Arc::new(MockHttpClient::new()),
            &ProviderApiConfig::new(),
        );
        assert!(matches!(result, Err(MediaError::NotConfigured(_))));
        assert!(YouTubeResolver::from_config(Arc::new(MockHttpClient::new()), &config())
            .unwrap()
            .streaming()
            .is_none());
    }
}
