//! Rich-media link parser
//!
//! Splits authored message text into content fragments. URLs on known
//! provider hosts become provider fragments flagged for sync, other URLs
//! become links, `@handles` become mentions, and the remaining text is
//! coalesced into text fragments.

use url::Url;

use crate::models::{ContentFragment, FragmentKind, MediaProvider};

/// Punctuation commonly glued to the end of a pasted link.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', ')', ']', '"', '\''];

/// Parse authored text into ordered content fragments.
///
/// # Example
///
/// ```
/// use core_messages::models::FragmentKind;
/// use core_messages::parser::parse_content;
///
/// let fragments = parse_content("watch https://youtu.be/dQw4w9WgXcQ now");
/// let kinds: Vec<_> = fragments.iter().map(|f| f.kind).collect();
/// assert_eq!(kinds, [FragmentKind::Text, FragmentKind::YouTube, FragmentKind::Text]);
/// assert!(fragments[1].sync_needed);
/// ```
pub fn parse_content(text: &str) -> Vec<ContentFragment> {
    let mut fragments = Vec::new();
    let mut text_start = 0;

    for (start, token) in tokens(text) {
        let trimmed = token.trim_end_matches(TRAILING_PUNCTUATION);
        let Some(kind) = classify_token(trimmed) else {
            continue;
        };

        push_text(&mut fragments, &text[text_start..start]);

        let fragment = match kind.provider() {
            Some(provider) => ContentFragment::media(provider, trimmed),
            None => ContentFragment::new(kind, trimmed),
        };
        fragments.push(fragment);

        // Stripped punctuation stays with the following text
        text_start = start + trimmed.len();
    }

    push_text(&mut fragments, &text[text_start..]);
    fragments
}

/// Provider referenced by a single link or URI, if any.
///
/// Recognises `spotify:` and `geo:` URIs plus web links on YouTube,
/// SoundCloud, Spotify and Google Maps hosts.
pub fn detect_provider(link: &str) -> Option<MediaProvider> {
    let url = Url::parse(link).ok()?;

    match url.scheme() {
        "spotify" => return Some(MediaProvider::Spotify),
        "geo" => return Some(MediaProvider::GoogleMaps),
        "http" | "https" => {}
        _ => return None,
    }

    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = url.path();

    match host {
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be"
        | "youtube-nocookie.com" => Some(MediaProvider::YouTube),
        "soundcloud.com" | "m.soundcloud.com" | "on.soundcloud.com" => {
            Some(MediaProvider::SoundCloud)
        }
        "open.spotify.com" | "play.spotify.com" => Some(MediaProvider::Spotify),
        "maps.google.com" | "maps.app.goo.gl" => Some(MediaProvider::GoogleMaps),
        "google.com" if path.starts_with("/maps") => Some(MediaProvider::GoogleMaps),
        "goo.gl" if path.starts_with("/maps") => Some(MediaProvider::GoogleMaps),
        _ => None,
    }
}

fn classify_token(token: &str) -> Option<FragmentKind> {
    if let Some(provider) = detect_provider(token) {
        return Some(provider.fragment_kind());
    }

    let lower = token.to_ascii_lowercase();
    if (lower.starts_with("http://") || lower.starts_with("https://")) && Url::parse(token).is_ok()
    {
        return Some(FragmentKind::Link);
    }

    let handle = token.strip_prefix('@')?;
    if !handle.is_empty()
        && handle
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Some(FragmentKind::Mention);
    }

    None
}

/// Whitespace-separated tokens with their byte offsets.
fn tokens(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_whitespace().map(move |token| {
        let start = token.as_ptr() as usize - text.as_ptr() as usize;
        (start, token)
    })
}

fn push_text(fragments: &mut Vec<ContentFragment>, segment: &str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        fragments.push(ContentFragment::text(segment));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<FragmentKind> {
        parse_content(text).into_iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_plain_text_is_one_fragment() {
        let fragments = parse_content("  hello   there  ");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].kind, FragmentKind::Text);
        assert_eq!(fragments[0].content, "hello   there");
        assert!(!fragments[0].sync_needed);
    }

    #[test]
    fn test_empty_text() {
        assert!(parse_content("").is_empty());
        assert!(parse_content("   ").is_empty());
    }

    #[test]
    fn test_provider_links() {
        assert_eq!(
            kinds("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            [FragmentKind::YouTube]
        );
        assert_eq!(
            kinds("https://soundcloud.com/artist/track-name"),
            [FragmentKind::SoundCloud]
        );
        assert_eq!(
            kinds("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            [FragmentKind::Spotify]
        );
        assert_eq!(
            kinds("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3?si=x"),
            [FragmentKind::Spotify]
        );
        assert_eq!(
            kinds("https://www.google.com/maps/@48.8584,2.2945,17z"),
            [FragmentKind::GoogleMaps]
        );
        assert_eq!(kinds("geo:37.786971,-122.399677"), [FragmentKind::GoogleMaps]);
    }

    #[test]
    fn test_mixed_content_preserves_order() {
        let fragments = parse_content(
            "look @sam https://youtu.be/abc and https://example.com/page, then geo:1.5,2.5!",
        );
        let kinds: Vec<_> = fragments.iter().map(|f| f.kind).collect();

        assert_eq!(
            kinds,
            [
                FragmentKind::Text,
                FragmentKind::Mention,
                FragmentKind::YouTube,
                FragmentKind::Text,
                FragmentKind::Link,
                FragmentKind::Text,
                FragmentKind::GoogleMaps,
                FragmentKind::Text,
            ]
        );
        assert_eq!(fragments[4].content, "https://example.com/page");
        assert_eq!(fragments[5].content, ", then");
        assert_eq!(fragments[6].content, "geo:1.5,2.5");
        assert_eq!(fragments[7].content, "!");
    }

    #[test]
    fn test_only_provider_fragments_need_sync() {
        for fragment in parse_content("@me https://youtu.be/x https://example.com text") {
            assert_eq!(fragment.sync_needed, fragment.provider().is_some());
        }
    }

    #[test]
    fn test_google_non_maps_is_plain_link() {
        assert_eq!(
            kinds("https://www.google.com/search?q=maps"),
            [FragmentKind::Link]
        );
        assert_eq!(detect_provider("mailto:a@b.c"), None);
        assert_eq!(detect_provider("not a link"), None);
    }

    #[test]
    fn test_lone_at_sign_is_text() {
        assert_eq!(kinds("meet @ noon"), [FragmentKind::Text]);
    }
}
