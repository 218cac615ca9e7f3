//! # Rich-Media Sync Demo
//!
//! Boots the core over an in-memory store, posts a few messages with media
//! links and prints the metadata each one ends up with.
//!
//! Google Maps links resolve without credentials. Export
//! `RICHMEDIA_YOUTUBE_API_KEY`, `RICHMEDIA_SOUNDCLOUD_CLIENT_ID` or the
//! Spotify pair to resolve those providers as well.
//!
//! Run with: `cargo run --example richmedia_demo --package core-service`

use anyhow::Context;
use core_messages::{InMemoryMessageStore, Message, MessageStore};
use core_runtime::config::{CoreConfig, ProviderApiConfig};
use core_runtime::events::{CoreEvent, RichMediaEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::CoreService;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let api = ProviderApiConfig::from_env()?;
    let config = CoreConfig::builder()
        .enable_youtube(api.has_youtube())
        .enable_soundcloud(api.has_soundcloud())
        .enable_spotify(api.has_spotify())
        .enable_google_maps(true)
        .enable_streaming(true)
        .provider_api_config(api)
        .build()?;

    let store = Arc::new(InMemoryMessageStore::new());
    let core = CoreService::bootstrap(config, store.clone()).await?;
    let mut events = core.events();

    let messages = vec![
        Message::rich_media("demo", "Meet here https://www.google.com/maps/@48.8584,2.2945,17z"),
        Message::rich_media("demo", "https://youtu.be/dQw4w9WgXcQ"),
        Message::rich_media("demo", "spotify:track:4cOdK2wGLETKBW3PvgPWqT"),
    ];
    let expected = messages.len();
    store.add_messages(messages).await?;

    let mut completed = 0;
    let deadline = tokio::time::sleep(Duration::from_secs(15));
    tokio::pin!(deadline);
    while completed < expected {
        tokio::select! {
            _ = &mut deadline => {
                println!("Timed out waiting for {} message(s)", expected - completed);
                break;
            }
            event = events.recv() => match event.context("event bus closed")? {
                CoreEvent::RichMedia(RichMediaEvent::FragmentFailed { message_id, index, kind, detail }) => {
                    println!("  {} fragment {} failed [{}]: {}", message_id, index, kind, detail);
                }
                CoreEvent::RichMedia(RichMediaEvent::SyncCompleted { .. }) => completed += 1,
                _ => {}
            },
        }
    }

    println!();
    for message in store.all_messages().await {
        println!("Message {}", message.id);
        for fragment in &message.content {
            match &fragment.media {
                Some(media) => println!(
                    "  {:?}: {} -> {}",
                    fragment.kind,
                    fragment.content,
                    media.title().unwrap_or("(untitled)")
                ),
                None => println!("  {:?}: {}", fragment.kind, fragment.content),
            }
        }
    }

    core.shutdown().await;
    Ok(())
}
