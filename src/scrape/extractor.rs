//! Release-page extraction: embedded blob → typed [`Release`].
//!
//! Release pages embed their catalog data as JSON inside a quoted HTML
//! attribute. Extraction locates that blob, unescapes it, repairs a known
//! vendor defect (JavaScript-style string concatenation inside a `url:`
//! value), decodes it, then runs a lyrics pass over the raw page body since
//! the rendered lyrics are more complete than the structured field.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::{NamingConfig, Release};

use super::dto::PageBlob;
use super::error::ScrapeError;

/// Opening marker of the embedded blob, up to and including the brace.
const BLOB_START: &str = r#"data-tralbum="{"#;

/// Terminator: the blob's closing brace followed by the attribute quote.
const BLOB_END: &str = r#"}""#;

/// Origin and prefix for synthesized artwork URLs.
const ARTWORK_URL_PREFIX: &str = "https://f4.bcbits.com/img/a";

/// Suffix selecting the full-size artwork rendition.
const ARTWORK_URL_SUFFIX: &str = "_0.jpg";

/// `url: "..." + "...",` concatenations that must be spliced into one literal.
static URL_CONCAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(url: ".+)" \+ "(.+",)"#).expect("url-concat regex is valid")
});

/// Markup tags, stripped from extracted lyrics text.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag-strip regex is valid"));

/// Character references: `&#NNN;`, `&#xHH;`, or a named entity.
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#x([0-9a-fA-F]+)|#([0-9]+)|([a-zA-Z][a-zA-Z0-9]*));")
        .expect("entity regex is valid")
});

/// Extracts the typed catalog for one release page.
///
/// Track records without a file reference are dropped silently; remaining
/// tracks keep their page order. All local paths are computed here, once.
///
/// # Errors
///
/// - [`ScrapeError::NotFound`] when the page has no embedded blob.
/// - [`ScrapeError::Malformed`] when the blob is unterminated or fails to
///   decode.
pub fn extract_catalog(page_html: &str, naming: &NamingConfig) -> Result<Release, ScrapeError> {
    let blob = extract_blob(page_html)?;
    let blob = unescape_html(&blob);
    let blob = repair_url_concat(&blob);

    let page: PageBlob = serde_json::from_str(&blob)
        .map_err(|e| ScrapeError::malformed(format!("release JSON: {e}")))?;

    let artist = page.artist.unwrap_or_default();
    let title = page
        .current
        .as_ref()
        .and_then(|c| c.title.clone())
        .unwrap_or_default();

    // Date precedence: top-level, then declared, then publish date.
    let release_date = page
        .album_release_date
        .or_else(|| page.current.as_ref().and_then(|c| c.release_date))
        .or_else(|| page.current.as_ref().and_then(|c| c.publish_date))
        .map(|dt| dt.date());

    let artwork_url = page
        .art_id
        .map(|id| format!("{ARTWORK_URL_PREFIX}{id:010}{ARTWORK_URL_SUFFIX}"));

    let mut release = Release::new(artist, title, artwork_url, release_date, naming);

    for record in page.trackinfo {
        // No file reference means no downloadable asset.
        let Some(audio_url) = record.file.and_then(|f| f.mp3_128) else {
            continue;
        };
        let audio_url = fix_protocol_relative(audio_url);
        let number = record.number.unwrap_or(1);
        release.push_track(
            number,
            1,
            record.title.unwrap_or_default(),
            record.duration,
            record.lyrics.filter(|l| !l.is_empty()),
            audio_url,
            naming,
        );
    }

    apply_page_lyrics(page_html, &mut release);

    debug!(
        artist = %release.artist,
        title = %release.title,
        tracks = release.tracks.len(),
        "extracted release catalog"
    );

    Ok(release)
}

/// Locates the embedded blob between [`BLOB_START`] and [`BLOB_END`].
fn extract_blob(page_html: &str) -> Result<String, ScrapeError> {
    let Some(start) = page_html.find(BLOB_START) else {
        return Err(ScrapeError::not_found("release data in HTML"));
    };

    // Keep the opening brace itself.
    let start = start + BLOB_START.len() - 1;
    let remaining = &page_html[start..];

    let Some(end) = remaining.find(BLOB_END) else {
        return Err(ScrapeError::malformed("unterminated release data"));
    };

    Ok(remaining[..=end].to_string())
}

/// Undoes the entity encoding the blob picks up from living inside a quoted
/// HTML attribute. Numeric character references (`&#8217;`, `&#xA0;`) appear
/// in rendered lyrics and titles, so the whole reference grammar is decoded,
/// not just the attribute-escape set. The single pass is leftmost-first, so
/// a double-escaped `&amp;quot;` unescapes one level at a time.
fn unescape_html(value: &str) -> String {
    ENTITY_RE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let code = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok()
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok()
            } else {
                return match &caps[3] {
                    "quot" => "\"".to_string(),
                    "apos" => "'".to_string(),
                    "lt" => "<".to_string(),
                    "gt" => ">".to_string(),
                    "nbsp" => "\u{00a0}".to_string(),
                    "amp" => "&".to_string(),
                    // Unknown names pass through untouched.
                    _ => caps[0].to_string(),
                };
            };
            code.and_then(char::from_u32)
                .map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Splices `url: "a" + "b",` into `url: "ab",` without touching unrelated
/// text that merely contains a similar substring.
fn repair_url_concat(blob: &str) -> String {
    URL_CONCAT_RE.replace_all(blob, "${1}${2}").into_owned()
}

/// Rewrites protocol-relative asset URLs to explicit http.
fn fix_protocol_relative(url: String) -> String {
    if url.starts_with("//") {
        format!("http:{url}")
    } else {
        url
    }
}

/// Overwrites track lyrics from per-track-numbered elements in the page body.
/// The rendered page text is authoritative over the structured field: once a
/// track's lyrics element exists, its text replaces the structured value even
/// when it is empty.
fn apply_page_lyrics(page_html: &str, release: &mut Release) {
    for track in &mut release.tracks {
        if let Some(lyrics) = extract_track_lyrics(page_html, track.number) {
            track.lyrics = (!lyrics.is_empty()).then_some(lyrics);
        }
    }
}

/// Pulls the lyrics text for one track number out of the raw page body.
/// `None` only when the page has no lyrics element for that track.
fn extract_track_lyrics(page_html: &str, number: u32) -> Option<String> {
    let marker = format!(r#"id="lyrics_row_{number}""#);
    let start = page_html.find(&marker)?;
    let remaining = &page_html[start..];

    let content_start = remaining.find('>')?;
    let body = &remaining[content_start + 1..];
    let content_end = body.find("</div>")?;

    let text = TAG_RE.replace_all(&body[..content_end], "");
    Some(unescape_html(&text).trim().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn naming() -> NamingConfig {
        NamingConfig {
            downloads_path: "/music/{artist}/{album}".to_string(),
            ..NamingConfig::default()
        }
    }

    /// Builds a page around an already-escaped blob body (without braces).
    fn page_with_blob(inner: &str) -> String {
        format!(r#"<html><script data-tralbum="{{{inner}}}"></script></html>"#)
    }

    const BASIC_BLOB: &str = concat!(
        r#"&quot;artist&quot;:&quot;The Band&quot;,"#,
        r#"&quot;art_id&quot;:12345,"#,
        r#"&quot;current&quot;:{&quot;title&quot;:&quot;The Album&quot;,"#,
        r#"&quot;release_date&quot;:&quot;01 Jan 2023 00:00:00 GMT&quot;},"#,
        r#"&quot;trackinfo&quot;:["#,
        r#"{&quot;title&quot;:&quot;One&quot;,&quot;track_num&quot;:1,&quot;duration&quot;:61.5,"#,
        r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;//t4.example/one&quot;}},"#,
        r#"{&quot;title&quot;:&quot;Interlude&quot;,&quot;track_num&quot;:2,&quot;duration&quot;:10.0},"#,
        r#"{&quot;title&quot;:&quot;Two&quot;,&quot;track_num&quot;:3,&quot;duration&quot;:30.25,"#,
        r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;http://t4.example/two&quot;}}"#,
        r#"]"#
    );

    #[test]
    fn test_extract_catalog_keeps_only_file_bearing_tracks_in_order() {
        let page = page_with_blob(BASIC_BLOB);
        let release = extract_catalog(&page, &naming()).unwrap();

        assert_eq!(release.artist, "The Band");
        assert_eq!(release.title, "The Album");
        assert_eq!(release.tracks.len(), 2);
        assert_eq!(release.tracks[0].title, "One");
        assert_eq!(release.tracks[1].title, "Two");
        assert_eq!(release.tracks[0].number, 1);
        assert_eq!(release.tracks[1].number, 3);
    }

    #[test]
    fn test_protocol_relative_urls_are_rewritten() {
        let page = page_with_blob(BASIC_BLOB);
        let release = extract_catalog(&page, &naming()).unwrap();
        assert_eq!(release.tracks[0].audio_url, "http://t4.example/one");
        assert_eq!(release.tracks[1].audio_url, "http://t4.example/two");
    }

    #[test]
    fn test_artwork_url_is_zero_padded_to_ten_digits() {
        let page = page_with_blob(BASIC_BLOB);
        let release = extract_catalog(&page, &naming()).unwrap();
        assert_eq!(
            release.artwork_url.as_deref(),
            Some("https://f4.bcbits.com/img/a0000012345_0.jpg")
        );
    }

    #[test]
    fn test_missing_track_number_defaults_to_one() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;},"#,
            r#"&quot;trackinfo&quot;:[{&quot;title&quot;:&quot;S&quot;,&quot;duration&quot;:5.0,"#,
            r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;http://x/s&quot;}}]"#
        );
        let release = extract_catalog(&page_with_blob(blob), &naming()).unwrap();
        assert_eq!(release.tracks[0].number, 1);
        assert_eq!(release.tracks[0].disc, 1);
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let err = extract_catalog("<html></html>", &naming()).unwrap_err();
        assert!(matches!(err, ScrapeError::NotFound { .. }));
    }

    #[test]
    fn test_unterminated_blob_is_malformed() {
        let page = r#"<script data-tralbum="{&quot;artist&quot;:&quot;A&quot;"#;
        let err = extract_catalog(page, &naming()).unwrap_err();
        assert!(matches!(err, ScrapeError::Malformed { .. }));
    }

    #[test]
    fn test_undecodable_blob_is_malformed() {
        let page = page_with_blob("&quot;artist&quot;:");
        let err = extract_catalog(&page, &naming()).unwrap_err();
        assert!(matches!(err, ScrapeError::Malformed { .. }));
    }

    #[test]
    fn test_nested_release_date_alone_resolves() {
        let page = page_with_blob(BASIC_BLOB);
        let release = extract_catalog(&page, &naming()).unwrap();
        assert_eq!(
            release.release_date,
            chrono::NaiveDate::from_ymd_opt(2023, 1, 1)
        );
    }

    #[test]
    fn test_top_level_date_wins_over_nested() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;album_release_date&quot;:&quot;02 Feb 2020 00:00:00 GMT&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;,"#,
            r#"&quot;release_date&quot;:&quot;01 Jan 2023 00:00:00 GMT&quot;},"#,
            r#"&quot;trackinfo&quot;:[]"#
        );
        let release = extract_catalog(&page_with_blob(blob), &naming()).unwrap();
        assert_eq!(
            release.release_date,
            chrono::NaiveDate::from_ymd_opt(2020, 2, 2)
        );
    }

    #[test]
    fn test_publish_date_is_last_resort() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;,"#,
            r#"&quot;publish_date&quot;:&quot;03 Mar 2021 00:00:00 GMT&quot;},"#,
            r#"&quot;trackinfo&quot;:[]"#
        );
        let release = extract_catalog(&page_with_blob(blob), &naming()).unwrap();
        assert_eq!(
            release.release_date,
            chrono::NaiveDate::from_ymd_opt(2021, 3, 3)
        );
    }

    #[test]
    fn test_no_dates_resolves_to_unknown() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;},"#,
            r#"&quot;trackinfo&quot;:[]"#
        );
        let release = extract_catalog(&page_with_blob(blob), &naming()).unwrap();
        assert!(release.release_date.is_none());
    }

    #[test]
    fn test_repair_url_concat_splices_literals() {
        let repaired = repair_url_concat(r#"url: "http://a.com" + "/x","#);
        assert_eq!(repaired, r#"url: "http://a.com/x","#);
    }

    #[test]
    fn test_repair_url_concat_passes_correct_values_through() {
        let input = r#"url: "http://a.com/x","#;
        assert_eq!(repair_url_concat(input), input);
    }

    #[test]
    fn test_repair_url_concat_ignores_unrelated_text() {
        let input = r#"lyrics: "one" + "two" is a phrase"#;
        assert_eq!(repair_url_concat(input), input);
    }

    #[test]
    fn test_lyrics_pass_overwrites_structured_lyrics() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;},"#,
            r#"&quot;trackinfo&quot;:[{&quot;title&quot;:&quot;S&quot;,&quot;track_num&quot;:1,"#,
            r#"&quot;duration&quot;:5.0,&quot;lyrics&quot;:&quot;stale&quot;,"#,
            r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;http://x/s&quot;}}]"#
        );
        let page = format!(
            "{}<div id=\"lyrics_row_1\" class=\"lyrics\"><p>Fresh line one<br>line two &amp; three</p></div>",
            page_with_blob(blob)
        );
        let release = extract_catalog(&page, &naming()).unwrap();
        assert_eq!(
            release.tracks[0].lyrics.as_deref(),
            Some("Fresh line oneline two & three")
        );
    }

    #[test]
    fn test_numeric_entities_decode_in_titles_and_lyrics() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;Don&#8217;t Stop&quot;},"#,
            r#"&quot;trackinfo&quot;:[{&quot;title&quot;:&quot;S&quot;,&quot;track_num&quot;:1,"#,
            r#"&quot;duration&quot;:5.0,"#,
            r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;http://x/s&quot;}}]"#
        );
        let page = format!(
            "{}<div id=\"lyrics_row_1\"><p>caf&#xE9;&#xA0;nights &#8212; gone</p></div>",
            page_with_blob(blob)
        );
        let release = extract_catalog(&page, &naming()).unwrap();
        assert_eq!(release.title, "Don\u{2019}t Stop");
        assert_eq!(
            release.tracks[0].lyrics.as_deref(),
            Some("caf\u{e9}\u{a0}nights \u{2014} gone")
        );
    }

    #[test]
    fn test_unescape_decodes_one_level_at_a_time() {
        assert_eq!(unescape_html("&amp;quot;"), "&quot;");
        assert_eq!(unescape_html("&#38;#39;"), "&#39;");
        assert_eq!(unescape_html("&unknownname; &#x110000;"), "&unknownname; &#x110000;");
    }

    #[test]
    fn test_empty_lyrics_element_clears_structured_value() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;},"#,
            r#"&quot;trackinfo&quot;:[{&quot;title&quot;:&quot;S&quot;,&quot;track_num&quot;:1,"#,
            r#"&quot;duration&quot;:5.0,&quot;lyrics&quot;:&quot;stale&quot;,"#,
            r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;http://x/s&quot;}}]"#
        );
        let page = format!(
            "{}<div id=\"lyrics_row_1\"><p>  </p></div>",
            page_with_blob(blob)
        );
        let release = extract_catalog(&page, &naming()).unwrap();
        assert!(release.tracks[0].lyrics.is_none(), "page element is authoritative");
    }

    #[test]
    fn test_lyrics_absent_keeps_structured_value() {
        let blob = concat!(
            r#"&quot;artist&quot;:&quot;A&quot;,"#,
            r#"&quot;current&quot;:{&quot;title&quot;:&quot;T&quot;},"#,
            r#"&quot;trackinfo&quot;:[{&quot;title&quot;:&quot;S&quot;,&quot;track_num&quot;:1,"#,
            r#"&quot;duration&quot;:5.0,&quot;lyrics&quot;:&quot;from json&quot;,"#,
            r#"&quot;file&quot;:{&quot;mp3-128&quot;:&quot;http://x/s&quot;}}]"#
        );
        let release = extract_catalog(&page_with_blob(blob), &naming()).unwrap();
        assert_eq!(release.tracks[0].lyrics.as_deref(), Some("from json"));
    }
}
