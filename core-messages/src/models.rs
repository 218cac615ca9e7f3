//! Domain models for chat messages and their rich-media content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::parser;

// =============================================================================
// ID Types
// =============================================================================

/// Opaque message identifier assigned by the message store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Kinds and Providers
// =============================================================================

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    /// Content references at least one external media provider
    RichMedia,
    Image,
    Location,
    System,
}

/// External media providers whose metadata can go stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaProvider {
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "soundcloud")]
    SoundCloud,
    #[serde(rename = "spotify")]
    Spotify,
    #[serde(rename = "google_maps")]
    GoogleMaps,
}

impl MediaProvider {
    pub const ALL: [MediaProvider; 4] = [
        MediaProvider::YouTube,
        MediaProvider::SoundCloud,
        MediaProvider::Spotify,
        MediaProvider::GoogleMaps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaProvider::YouTube => "youtube",
            MediaProvider::SoundCloud => "soundcloud",
            MediaProvider::Spotify => "spotify",
            MediaProvider::GoogleMaps => "google_maps",
        }
    }

    /// Fragment kind used for content that references this provider
    pub fn fragment_kind(&self) -> FragmentKind {
        match self {
            MediaProvider::YouTube => FragmentKind::YouTube,
            MediaProvider::SoundCloud => FragmentKind::SoundCloud,
            MediaProvider::Spotify => FragmentKind::Spotify,
            MediaProvider::GoogleMaps => FragmentKind::GoogleMaps,
        }
    }
}

impl fmt::Display for MediaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a single content fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Text,
    /// URL to a site with no dedicated resolver
    Link,
    Mention,
    /// Attachment stored by the messaging backend
    Asset,
    #[serde(rename = "youtube")]
    YouTube,
    GoogleMaps,
    #[serde(rename = "soundcloud")]
    SoundCloud,
    Spotify,
}

impl FragmentKind {
    /// Provider referenced by this kind, if any
    pub fn provider(&self) -> Option<MediaProvider> {
        match self {
            FragmentKind::YouTube => Some(MediaProvider::YouTube),
            FragmentKind::GoogleMaps => Some(MediaProvider::GoogleMaps),
            FragmentKind::SoundCloud => Some(MediaProvider::SoundCloud),
            FragmentKind::Spotify => Some(MediaProvider::Spotify),
            FragmentKind::Text | FragmentKind::Link | FragmentKind::Mention | FragmentKind::Asset => {
                None
            }
        }
    }
}

// =============================================================================
// Provider Metadata
// =============================================================================

/// Short description of one track inside an album or playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub duration_ms: Option<u64>,
    /// Directly playable preview, when the provider exposes one
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YouTubeVideo {
    pub video_id: String,
    pub title: String,
    pub channel_title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: Option<u64>,
    pub published_at: Option<String>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCloudKind {
    Track,
    Playlist,
}

impl SoundCloudKind {
    /// API collection name ("tracks" / "playlists")
    pub fn collection(&self) -> &'static str {
        match self {
            SoundCloudKind::Track => "tracks",
            SoundCloudKind::Playlist => "playlists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundCloudMedia {
    pub kind: SoundCloudKind,
    pub id: u64,
    pub title: String,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
    pub duration_ms: Option<u64>,
    pub permalink_url: String,
    /// Playlist entries in playlist order; empty for tracks
    pub tracks: Vec<TrackSummary>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
    Artist,
}

impl SpotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotifyKind::Track => "track",
            SpotifyKind::Album => "album",
            SpotifyKind::Playlist => "playlist",
            SpotifyKind::Artist => "artist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "track" => Some(SpotifyKind::Track),
            "album" => Some(SpotifyKind::Album),
            "playlist" => Some(SpotifyKind::Playlist),
            "artist" => Some(SpotifyKind::Artist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyMedia {
    pub kind: SpotifyKind,
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub duration_ms: Option<u64>,
    pub preview_url: Option<String>,
    /// Album, playlist or artist top tracks in provider order
    pub tracks: Vec<TrackSummary>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: Option<u8>,
    /// Place name taken from the link, if present
    pub name: Option<String>,
    /// Reverse-geocoded address
    pub address: Option<String>,
    /// Static-map preview without credentials; the renderer appends its key
    pub preview_url: Option<String>,
    pub refreshed_at: DateTime<Utc>,
}

/// Provider metadata attached to a fragment by the last successful refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum MediaInfo {
    #[serde(rename = "youtube")]
    YouTube(YouTubeVideo),
    #[serde(rename = "soundcloud")]
    SoundCloud(SoundCloudMedia),
    Spotify(SpotifyMedia),
    Location(MapLocation),
}

impl MediaInfo {
    pub fn provider(&self) -> MediaProvider {
        match self {
            MediaInfo::YouTube(_) => MediaProvider::YouTube,
            MediaInfo::SoundCloud(_) => MediaProvider::SoundCloud,
            MediaInfo::Spotify(_) => MediaProvider::Spotify,
            MediaInfo::Location(_) => MediaProvider::GoogleMaps,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            MediaInfo::YouTube(video) => Some(&video.title),
            MediaInfo::SoundCloud(media) => Some(&media.title),
            MediaInfo::Spotify(media) => Some(&media.title),
            MediaInfo::Location(location) => location.name.as_deref(),
        }
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        match self {
            MediaInfo::YouTube(video) => video.refreshed_at,
            MediaInfo::SoundCloud(media) => media.refreshed_at,
            MediaInfo::Spotify(media) => media.refreshed_at,
            MediaInfo::Location(location) => location.refreshed_at,
        }
    }

    /// Descriptor used to request streaming URIs for this media.
    ///
    /// References: YouTube video id, SoundCloud `tracks/{id}` or
    /// `playlists/{id}`, Spotify URI, `lat,lng` for locations.
    pub fn asset(&self) -> MediaAsset {
        match self {
            MediaInfo::YouTube(video) => MediaAsset::new(MediaProvider::YouTube, &video.video_id),
            MediaInfo::SoundCloud(media) => MediaAsset::new(
                MediaProvider::SoundCloud,
                format!("{}/{}", media.kind.collection(), media.id),
            ),
            MediaInfo::Spotify(media) => MediaAsset::new(
                MediaProvider::Spotify,
                format!("spotify:{}:{}", media.kind.as_str(), media.id),
            ),
            MediaInfo::Location(location) => MediaAsset::new(
                MediaProvider::GoogleMaps,
                format!("{},{}", location.latitude, location.longitude),
            ),
        }
    }
}

/// Provider tag plus provider-specific reference, used to request streaming
/// URIs. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaAsset {
    provider: MediaProvider,
    reference: String,
}

impl MediaAsset {
    pub fn new(provider: MediaProvider, reference: impl Into<String>) -> Self {
        Self {
            provider,
            reference: reference.into(),
        }
    }

    pub fn provider(&self) -> MediaProvider {
        self.provider
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for MediaAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.reference)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// One piece of a message's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFragment {
    pub kind: FragmentKind,
    /// Payload as authored (text, link, provider id)
    pub content: String,
    /// Metadata from the last successful provider refresh
    pub media: Option<MediaInfo>,
    /// An update is outstanding or the payload changed since the last
    /// resolution round
    pub sync_needed: bool,
}

impl ContentFragment {
    pub fn new(kind: FragmentKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            media: None,
            sync_needed: false,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(FragmentKind::Text, content)
    }

    pub fn link(content: impl Into<String>) -> Self {
        Self::new(FragmentKind::Link, content)
    }

    /// Fragment referencing `provider`, flagged for its first sync
    pub fn media(provider: MediaProvider, content: impl Into<String>) -> Self {
        Self::new(provider.fragment_kind(), content).with_sync_needed(true)
    }

    pub fn with_media(mut self, media: MediaInfo) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_sync_needed(mut self, sync_needed: bool) -> Self {
        self.sync_needed = sync_needed;
        self
    }

    pub fn provider(&self) -> Option<MediaProvider> {
        self.kind.provider()
    }

    /// Payload equality, ignoring metadata and sync state
    pub fn same_payload(&self, other: &ContentFragment) -> bool {
        self.kind == other.kind && self.content == other.content
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: String,
    pub kind: MessageKind,
    /// Ordered content fragments
    pub content: Vec<ContentFragment>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        conversation_id: impl Into<String>,
        kind: MessageKind,
        content: Vec<ContentFragment>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id: conversation_id.into(),
            kind,
            content,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    /// Plain text message with a single text fragment
    pub fn text(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            conversation_id,
            MessageKind::Text,
            vec![ContentFragment::text(text)],
        )
    }

    /// Parses authored text into fragments. The message is `RichMedia` when
    /// any fragment references a media provider, `Text` otherwise.
    pub fn rich_media(conversation_id: impl Into<String>, text: &str) -> Self {
        let content = parser::parse_content(text);
        let kind = kind_for(&content);
        Self::new(conversation_id, kind, content)
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    /// Copy of this message with new authored text, as an edit would
    /// produce. Unchanged fragments keep their metadata and sync state.
    pub fn edited(&self, text: &str) -> Self {
        let mut content = parser::parse_content(text);
        for (index, fragment) in content.iter_mut().enumerate() {
            if let Some(previous) = self.content.get(index) {
                if previous.same_payload(fragment) {
                    *fragment = previous.clone();
                }
            }
        }

        Self {
            kind: kind_for(&content),
            content,
            edited_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Whether any fragment still awaits a resolution round
    pub fn has_pending_sync(&self) -> bool {
        self.content.iter().any(|f| f.sync_needed)
    }
}

fn kind_for(content: &[ContentFragment]) -> MessageKind {
    if content.iter().any(|f| f.provider().is_some()) {
        MessageKind::RichMedia
    } else {
        MessageKind::Text
    }
}
