//! Filename templates and the filesystem sanitizer.
//!
//! All user-visible path components are produced from string templates with
//! `{artist}`, `{album}`, `{title}`, `{tracknum}`, `{year}`, `{month}` and
//! `{day}` placeholders. Every substituted component is passed through
//! [`sanitize_file_name`] so release metadata can never escape the target
//! directory or produce names the filesystem rejects.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Maximum length for a release directory path (Windows folder limit).
pub(crate) const MAX_DIR_PATH: usize = 248;

/// Maximum length for a full file path (Windows MAX_PATH).
pub(crate) const MAX_FILE_PATH: usize = 260;

static INVALID_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("invalid-chars regex is valid")
});

static TRAILING_DOTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.+$").expect("trailing-dots regex is valid"));

static WHITESPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Naming templates for everything the downloader writes to disk.
///
/// `downloads_path` is a directory template (placeholders are sanitized
/// per-component so path separators in the template survive); the three
/// file-name templates are sanitized as a whole after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConfig {
    /// Directory template for a release, e.g. `/music/{artist}/{album}`.
    pub downloads_path: String,
    /// Track file-name template including extension,
    /// e.g. `{tracknum} {artist} - {title}.mp3`.
    pub track_file_format: String,
    /// Cover-art file-name template without extension (taken from the URL).
    pub cover_file_format: String,
    /// Playlist file-name template without extension.
    pub playlist_file_format: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            downloads_path: "{artist}/{album}".to_string(),
            track_file_format: "{tracknum} {artist} - {title}.mp3".to_string(),
            cover_file_format: "{album}".to_string(),
            playlist_file_format: "{album}".to_string(),
        }
    }
}

/// Replaces characters that are invalid in file or folder names.
///
/// - `<>:"/\|?*` and ASCII control characters become `_`
/// - trailing dots are stripped
/// - whitespace runs collapse to a single space
/// - trailing whitespace is removed
pub fn sanitize_file_name(name: &str) -> String {
    let name = INVALID_CHARS_RE.replace_all(name, "_");
    let name = TRAILING_DOTS_RE.replace_all(&name, "");
    let name = WHITESPACE_RUN_RE.replace_all(&name, " ");
    name.trim_end_matches(' ').to_string()
}

/// Renders the `{year}`/`{month}`/`{day}` components for a release date.
///
/// An unknown date renders as `0001`/`01`/`01`, matching the zero value the
/// rest of the path pipeline was built around.
pub(crate) fn date_parts(date: Option<NaiveDate>) -> (String, String, String) {
    match date {
        Some(d) => (
            d.format("%Y").to_string(),
            d.format("%m").to_string(),
            d.format("%d").to_string(),
        ),
        None => ("0001".to_string(), "01".to_string(), "01".to_string()),
    }
}

/// Expands a directory template, sanitizing each substituted value.
pub(crate) fn expand_dir_template(
    template: &str,
    artist: &str,
    album: &str,
    date: Option<NaiveDate>,
) -> PathBuf {
    let (year, month, day) = date_parts(date);
    let mut path = template.to_string();
    path = path.replace("{year}", &sanitize_file_name(&year));
    path = path.replace("{month}", &sanitize_file_name(&month));
    path = path.replace("{day}", &sanitize_file_name(&day));
    path = path.replace("{artist}", &sanitize_file_name(artist));
    path = path.replace("{album}", &sanitize_file_name(album));

    if path.len() >= MAX_DIR_PATH {
        // Byte budget, cut back to the nearest char boundary.
        let mut cut = MAX_DIR_PATH - 1;
        while !path.is_char_boundary(cut) {
            cut -= 1;
        }
        path.truncate(cut);
    }

    PathBuf::from(path)
}

/// Expands a file-name template and sanitizes the result as a whole.
pub(crate) fn expand_file_template(
    template: &str,
    artist: &str,
    album: &str,
    date: Option<NaiveDate>,
    title: Option<&str>,
    track_number: Option<u32>,
) -> String {
    let (year, month, day) = date_parts(date);
    let mut name = template.to_string();
    name = name.replace("{year}", &year);
    name = name.replace("{month}", &month);
    name = name.replace("{day}", &day);
    name = name.replace("{album}", album);
    name = name.replace("{artist}", artist);
    if let Some(title) = title {
        name = name.replace("{title}", title);
    }
    if let Some(number) = track_number {
        name = name.replace("{tracknum}", &format!("{number:02}"));
    }
    sanitize_file_name(&name)
}

/// Joins a directory and file name, truncating the file-name portion when the
/// full path would exceed the platform limit. The extension is preserved.
pub(crate) fn join_with_limit(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    if path.as_os_str().len() < MAX_FILE_PATH {
        return path;
    }

    let ext = Path::new(file_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let max_stem = 11_usize.saturating_sub(ext.len());
    if max_stem > 0 && max_stem < file_name.len() {
        let stem: String = file_name.chars().take(max_stem).collect();
        return dir.join(format!("{stem}{ext}"));
    }

    path
}
