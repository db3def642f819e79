//! Discography resolution: expanding an artist listing page into leaf URLs.
//!
//! Listing pages come in two shapes. A normal music page lists many releases,
//! which we harvest with a text scan. Artists with exactly one release get
//! their music page served as the release page itself; we detect that via a
//! marker element and fall back to anchor extraction. The marker is a
//! heuristic of the source site's page template, treated as best-effort.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::error::ScrapeError;

/// Element present on release pages but not on music listing pages.
const SINGLE_RELEASE_MARKER: &str = r#"div id="discography""#;

/// Release links as they appear anywhere in listing-page text. The terminator
/// may be a literal quote or its HTML-entity form.
static RELEASE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<url>/(album|track)/.+?)("|&quot;)"#).expect("release-link regex is valid")
});

/// Album anchors on a single-release page.
static SINGLE_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(?P<url>/album/.+?)""#).expect("single-anchor regex is valid")
});

/// Extracts relative leaf URLs (`/album/...`, `/track/...`) from a listing
/// page, deduplicated and in first-seen order.
///
/// # Errors
///
/// - [`ScrapeError::Ambiguous`] when the single-release marker is present but
///   the page does not contain exactly one album anchor.
/// - [`ScrapeError::NotFound`] when a normal listing yields no candidates.
pub fn resolve_leaf_urls(listing_html: &str) -> Result<Vec<String>, ScrapeError> {
    if listing_html.contains(SINGLE_RELEASE_MARKER) {
        return single_release_url(listing_html).map(|url| vec![url]);
    }

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for capture in RELEASE_LINK_RE.captures_iter(listing_html) {
        let url = &capture["url"];
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    if urls.is_empty() {
        return Err(ScrapeError::not_found("release links on listing page"));
    }
    Ok(urls)
}

/// Extracts the one album URL from a page carrying the single-release marker.
fn single_release_url(html: &str) -> Result<String, ScrapeError> {
    let mut unique: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for capture in SINGLE_ANCHOR_RE.captures_iter(html) {
        let url = capture["url"].to_string();
        if seen.insert(url.clone()) {
            unique.push(url);
        }
    }

    match unique.len() {
        1 => Ok(unique.remove(0)),
        count => Err(ScrapeError::ambiguous(format!(
            "{count} album anchors on single-release page, expected exactly 1"
        ))),
    }
}
