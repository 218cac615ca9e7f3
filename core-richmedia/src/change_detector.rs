//! Detects edits that warrant another resolution round.

use core_messages::ContentFragment;

use crate::classifier::is_syncable;

/// Compare two content snapshots of the same message.
///
/// Returns true when the fragment counts differ, or when a positionally
/// paired fragment changed its payload and the updated fragment is
/// syncable. Metadata and sync flags are not part of the payload.
///
/// ```
/// use core_messages::ContentFragment;
/// use core_richmedia::change_detector::content_changed;
///
/// let before = vec![ContentFragment::text("hi")];
/// let after = vec![ContentFragment::text("hello")];
/// assert!(!content_changed(&before, &after));
/// ```
pub fn content_changed(previous: &[ContentFragment], updated: &[ContentFragment]) -> bool {
    if previous.len() != updated.len() {
        return true;
    }

    previous
        .iter()
        .zip(updated)
        .any(|(before, after)| !before.same_payload(after) && is_syncable(after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_messages::{FragmentKind, MapLocation, MediaInfo, MediaProvider};

    fn youtube(id: &str) -> ContentFragment {
        ContentFragment::new(FragmentKind::YouTube, id)
    }

    #[test]
    fn test_count_change_is_a_change() {
        let previous = vec![ContentFragment::text("a"), youtube("id1")];
        let updated = vec![ContentFragment::text("a")];
        assert!(content_changed(&previous, &updated));
        assert!(content_changed(&updated, &previous));
    }

    #[test]
    fn test_identical_payloads_are_unchanged() {
        let previous = vec![ContentFragment::text("a"), youtube("id1")];
        assert!(!content_changed(&previous, &previous.clone()));
    }

    #[test]
    fn test_non_syncable_payload_change_is_ignored() {
        let previous = vec![ContentFragment::text("a"), youtube("id1")];
        let updated = vec![ContentFragment::text("b"), youtube("id1")];
        assert!(!content_changed(&previous, &updated));
    }

    #[test]
    fn test_syncable_payload_change_is_detected() {
        let previous = vec![ContentFragment::text("a"), youtube("id1")];
        let updated = vec![ContentFragment::text("a"), youtube("id2")];
        assert!(content_changed(&previous, &updated));
    }

    #[test]
    fn test_kind_change_to_syncable_is_detected() {
        let previous = vec![ContentFragment::link("https://maps.google.com/?q=1,2")];
        let updated = vec![ContentFragment::media(
            MediaProvider::GoogleMaps,
            "https://maps.google.com/?q=1,2",
        )];
        assert!(content_changed(&previous, &updated));
        assert!(!content_changed(&updated, &previous));
    }

    #[test]
    fn test_metadata_and_flags_are_not_payload() {
        let previous = vec![ContentFragment::media(MediaProvider::GoogleMaps, "geo:1,2")];
        let updated = vec![previous[0]
            .clone()
            .with_sync_needed(false)
            .with_media(MediaInfo::Location(MapLocation {
                latitude: 1.0,
                longitude: 2.0,
                zoom: None,
                name: None,
                address: Some("Somewhere".into()),
                preview_url: None,
                refreshed_at: Utc::now(),
            }))];
        assert!(!content_changed(&previous, &updated));
    }
}
