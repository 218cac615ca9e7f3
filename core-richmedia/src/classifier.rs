//! Content classification
//!
//! Decides which fragments reference an external provider whose metadata can
//! go stale. Classification depends on the fragment kind alone.

use core_messages::{ContentFragment, Message, MessageKind};

/// Whether `fragment` needs its metadata refreshed from a provider.
///
/// True exactly for YouTube, Google Maps, SoundCloud and Spotify fragments.
pub fn is_syncable(fragment: &ContentFragment) -> bool {
    fragment.kind.provider().is_some()
}

/// Whether `message` is a rich-media message with at least one syncable
/// fragment.
pub fn is_syncable_message(message: &Message) -> bool {
    message.kind == MessageKind::RichMedia && message.content.iter().any(is_syncable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_messages::{FragmentKind, MediaProvider};

    const ALL_KINDS: [FragmentKind; 8] = [
        FragmentKind::Text,
        FragmentKind::Link,
        FragmentKind::Mention,
        FragmentKind::Asset,
        FragmentKind::YouTube,
        FragmentKind::GoogleMaps,
        FragmentKind::SoundCloud,
        FragmentKind::Spotify,
    ];

    #[test]
    fn test_syncable_depends_on_kind_only() {
        let syncable: Vec<FragmentKind> = MediaProvider::ALL
            .iter()
            .map(|p| p.fragment_kind())
            .collect();

        for kind in ALL_KINDS {
            let expected = syncable.contains(&kind);
            for content in ["", "id1", "https://example.com"] {
                for sync_needed in [false, true] {
                    let fragment =
                        ContentFragment::new(kind, content).with_sync_needed(sync_needed);
                    assert_eq!(is_syncable(&fragment), expected, "{:?}", kind);
                }
            }
        }
    }

    #[test]
    fn test_syncable_message_requires_rich_media_kind() {
        let fragments = vec![
            ContentFragment::text("look"),
            ContentFragment::new(FragmentKind::YouTube, "id1"),
        ];

        let rich = Message::new("c-1", MessageKind::RichMedia, fragments.clone());
        assert!(is_syncable_message(&rich));

        let text = Message::new("c-1", MessageKind::Text, fragments);
        assert!(!is_syncable_message(&text));

        let no_media = Message::new(
            "c-1",
            MessageKind::RichMedia,
            vec![ContentFragment::link("https://example.com")],
        );
        assert!(!is_syncable_message(&no_media));
    }
}
