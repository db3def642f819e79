//! Wire-format records for the embedded release blob.
//!
//! These mirror the vendor's JSON shape exactly; conversion into the typed
//! [`Release`](crate::model::Release) happens in the extractor. Everything
//! the page may omit is an `Option`.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Top-level embedded page record.
#[derive(Debug, Deserialize)]
pub(crate) struct PageBlob {
    /// Nested record holding the title and per-release dates.
    #[serde(default)]
    pub current: Option<CurrentBlock>,
    /// Numeric artwork id; the artwork URL is synthesized from it.
    #[serde(default)]
    pub art_id: Option<i64>,
    /// Release artist.
    #[serde(default)]
    pub artist: Option<String>,
    /// Top-level release date; wins over everything in `current`.
    #[serde(default, deserialize_with = "deserialize_page_date")]
    pub album_release_date: Option<NaiveDateTime>,
    /// Raw track records in page order.
    #[serde(default)]
    pub trackinfo: Vec<TrackRecord>,
}

/// The nested `current` record.
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentBlock {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_page_date")]
    pub release_date: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_page_date")]
    pub publish_date: Option<NaiveDateTime>,
}

/// One raw track record.
#[derive(Debug, Deserialize)]
pub(crate) struct TrackRecord {
    #[serde(default)]
    pub duration: f64,
    /// File reference; absence means the track has no downloadable asset.
    #[serde(default)]
    pub file: Option<FileRef>,
    #[serde(default)]
    pub lyrics: Option<String>,
    /// 1-indexed track number; standalone track pages omit it.
    #[serde(rename = "track_num", default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Audio asset reference inside a track record.
#[derive(Debug, Deserialize)]
pub(crate) struct FileRef {
    #[serde(rename = "mp3-128", default)]
    pub mp3_128: Option<String>,
}

/// Page dates in their day-month-year form, with the trailing timezone
/// abbreviation removed before parsing. Two day-padding variants occur.
const DMY_FORMATS: &[&str] = &["%d %b %Y %H:%M:%S", "%e %b %Y %H:%M:%S"];

/// ISO timestamp without an offset, as some pages emit.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses one of the date encodings seen on release pages.
///
/// Tried in order: day-month-year with a timezone abbreviation (padded then
/// unpadded day), RFC 3339, then the bare ISO form. A non-empty value matching
/// none of them is an error.
pub(crate) fn parse_page_date(value: &str) -> Result<NaiveDateTime, String> {
    let stripped = strip_tz_abbrev(value);
    for format in DMY_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(stripped, format) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, ISO_FORMAT) {
        return Ok(parsed);
    }
    Err(format!("unable to parse date: {value}"))
}

/// Removes a trailing timezone abbreviation ("GMT", "UTC", ...) if present.
fn strip_tz_abbrev(value: &str) -> &str {
    if let Some((head, tail)) = value.trim_end().rsplit_once(' ')
        && tail.len() >= 2
        && tail.chars().all(|c| c.is_ascii_uppercase())
    {
        return head;
    }
    value
}

/// Serde adapter: null or empty string is `None`; anything else must parse.
fn deserialize_page_date<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(text) => parse_page_date(text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_padded_day_with_timezone() {
        let parsed = parse_page_date("01 Jan 2023 00:00:00 GMT").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2023, 1, 1));
    }

    #[test]
    fn test_parse_unpadded_day_with_timezone() {
        let parsed = parse_page_date("9 Feb 2024 12:30:00 GMT").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 2, 9));
        assert_eq!(parsed.hour(), 12);
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = parse_page_date("2021-06-15T10:00:00Z").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2021, 6, 15));
    }

    #[test]
    fn test_parse_iso_without_offset() {
        let parsed = parse_page_date("2021-06-15T10:00:00").unwrap();
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn test_unparseable_date_is_an_error() {
        assert!(parse_page_date("sometime in spring").is_err());
    }

    #[test]
    fn test_blob_decodes_minimal_record() {
        let json = r#"{"artist":"A","trackinfo":[]}"#;
        let blob: PageBlob = serde_json::from_str(json).unwrap();
        assert_eq!(blob.artist.as_deref(), Some("A"));
        assert!(blob.current.is_none());
        assert!(blob.trackinfo.is_empty());
    }

    #[test]
    fn test_blob_empty_date_string_is_none() {
        let json = r#"{"artist":"A","album_release_date":"","trackinfo":[]}"#;
        let blob: PageBlob = serde_json::from_str(json).unwrap();
        assert!(blob.album_release_date.is_none());
    }

    #[test]
    fn test_blob_bad_date_string_fails_decode() {
        let json = r#"{"artist":"A","album_release_date":"whenever","trackinfo":[]}"#;
        assert!(serde_json::from_str::<PageBlob>(json).is_err());
    }

    #[test]
    fn test_track_record_without_file_decodes() {
        let json = r#"{"title":"T","duration":10.5,"track_num":2}"#;
        let record: TrackRecord = serde_json::from_str(json).unwrap();
        assert!(record.file.is_none());
        assert_eq!(record.number, Some(2));
    }
}
