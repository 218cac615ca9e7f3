//! # Message Store Module
//!
//! The chat message model as seen by the rich-media sync core, and the store
//! contract it reads and writes through.
//!
//! ## Overview
//!
//! - [`models`] - messages, content fragments, provider metadata, media assets
//! - [`store`] - the [`MessageStore`] trait, its mutation events and an
//!   in-memory implementation used on desktop and in tests
//! - [`parser`] - turns authored text into content fragments, recognising
//!   links to known media providers
//!
//! The persistent store used by mobile hosts lives outside this workspace and
//! implements [`MessageStore`].

pub mod error;
pub mod models;
pub mod parser;
pub mod store;

pub use error::{MessageStoreError, Result};
pub use models::{
    ContentFragment, FragmentKind, MapLocation, MediaAsset, MediaInfo, MediaProvider, Message,
    MessageId, MessageKind, SoundCloudKind, SoundCloudMedia, SpotifyKind, SpotifyMedia,
    TrackSummary, YouTubeVideo,
};
pub use store::{
    ContentTransform, InMemoryMessageStore, MessageEvent, MessageStore, MessageTransform,
};
