//! Leaf-vs-root classification for input URLs.
//!
//! A leaf URL addresses one release or standalone track page directly; an
//! artist root needs discography expansion first. Classification looks only
//! at path segments, performs no network access, and has no side effects.

use url::Url;

/// How an input URL should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Addresses a single release or track page.
    Leaf,
    /// An artist root that needs listing-page discovery.
    ArtistRoot,
}

/// Classifies an input URL by its path segments.
///
/// A URL is a leaf when an `album` or `track` marker segment is followed by a
/// non-empty slug. Everything else (including unparseable input, which will
/// fail loudly later when fetched) is treated as an artist root.
#[must_use]
pub fn classify_url(url: &str) -> UrlKind {
    let Ok(parsed) = Url::parse(url) else {
        return UrlKind::ArtistRoot;
    };
    let Some(segments) = parsed.path_segments() else {
        return UrlKind::ArtistRoot;
    };

    let segments: Vec<&str> = segments.collect();
    for pair in segments.windows(2) {
        if matches!(pair[0], "album" | "track") && !pair[1].is_empty() {
            return UrlKind::Leaf;
        }
    }

    UrlKind::ArtistRoot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_album_url_is_leaf() {
        assert_eq!(
            classify_url("https://artist.bandcamp.com/album/my-album"),
            UrlKind::Leaf
        );
    }

    #[test]
    fn test_track_url_is_leaf() {
        assert_eq!(
            classify_url("https://artist.bandcamp.com/track/my-track"),
            UrlKind::Leaf
        );
    }

    #[test]
    fn test_artist_root_is_root() {
        assert_eq!(
            classify_url("https://artist.bandcamp.com"),
            UrlKind::ArtistRoot
        );
        assert_eq!(
            classify_url("https://artist.bandcamp.com/music"),
            UrlKind::ArtistRoot
        );
    }

    #[test]
    fn test_marker_without_slug_is_root() {
        assert_eq!(
            classify_url("https://artist.bandcamp.com/album/"),
            UrlKind::ArtistRoot
        );
    }

    #[test]
    fn test_marker_in_middle_of_path_is_leaf() {
        assert_eq!(
            classify_url("https://example.com/site/album/name"),
            UrlKind::Leaf
        );
    }

    #[test]
    fn test_unparseable_input_is_root() {
        assert_eq!(classify_url("not a url"), UrlKind::ArtistRoot);
    }
}
