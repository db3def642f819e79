//! Catalog value objects: releases, tracks, and naming templates.
//!
//! A [`Release`] is the typed result of parsing one release page. All local
//! paths (release directory, per-track files, cover art, playlist) are pure
//! functions of `(artist, title, date, NamingConfig)` and are computed once at
//! construction; nothing in the download pipeline recomputes them.

mod naming;
mod track;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

pub use naming::{NamingConfig, sanitize_file_name};
pub use track::Track;

use naming::{expand_dir_template, expand_file_template, join_with_limit};

/// A release (album or standalone track page) with its ordered tracks and
/// computed local paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    /// Release artist name.
    pub artist: String,
    /// Release title.
    pub title: String,
    /// Cover-art URL, when the page declares artwork.
    pub artwork_url: Option<String>,
    /// Resolved release date; `None` when the page carried no usable date.
    pub release_date: Option<NaiveDate>,
    /// Tracks in page order.
    pub tracks: Vec<Track>,
    /// Computed root directory for this release.
    pub dir: PathBuf,
    /// Computed cover-art path; `None` when the release has no artwork.
    pub artwork_path: Option<PathBuf>,
    /// Computed playlist path.
    pub playlist_path: PathBuf,
}

impl Release {
    /// Creates a release and computes its directory, artwork, and playlist
    /// paths from the naming templates. Tracks are attached afterwards with
    /// [`push_track`](Self::push_track).
    #[must_use]
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        artwork_url: Option<String>,
        release_date: Option<NaiveDate>,
        naming: &NamingConfig,
    ) -> Self {
        let artist = artist.into();
        let title = title.into();

        let dir = expand_dir_template(&naming.downloads_path, &artist, &title, release_date);

        let artwork_path = artwork_url.as_deref().map(|url| {
            let ext = artwork_extension(url);
            let name = expand_file_template(
                &naming.cover_file_format,
                &artist,
                &title,
                release_date,
                None,
                None,
            );
            join_with_limit(&dir, &format!("{name}{ext}"))
        });

        let playlist_name = expand_file_template(
            &naming.playlist_file_format,
            &artist,
            &title,
            release_date,
            None,
            None,
        );
        let playlist_path = join_with_limit(&dir, &format!("{playlist_name}.m3u"));

        Self {
            artist,
            title,
            artwork_url,
            release_date,
            tracks: Vec::new(),
            dir,
            artwork_path,
            playlist_path,
        }
    }

    /// Attaches a track, computing its local path from the parent's directory
    /// and the track file-name template.
    pub fn push_track(
        &mut self,
        number: u32,
        disc: u32,
        title: impl Into<String>,
        duration: f64,
        lyrics: Option<String>,
        audio_url: impl Into<String>,
        naming: &NamingConfig,
    ) {
        let title = title.into();
        let file_name = expand_file_template(
            &naming.track_file_format,
            &self.artist,
            &self.title,
            self.release_date,
            Some(&title),
            Some(number),
        );
        let path = join_with_limit(&self.dir, &file_name);

        self.tracks.push(Track {
            number,
            disc,
            title,
            duration,
            lyrics,
            audio_url: audio_url.into(),
            path,
        });
    }

    /// True when the release declares downloadable cover art.
    #[must_use]
    pub fn has_artwork(&self) -> bool {
        self.artwork_url.is_some()
    }

    /// Number of downloadable assets (tracks plus optional artwork).
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.tracks.len() + usize::from(self.has_artwork())
    }

    /// One-line display label used in progress events.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} - {} ({} tracks)", self.artist, self.title, self.tracks.len())
    }
}

/// Extension (with leading dot) taken from an artwork URL, defaulting to `.jpg`.
fn artwork_extension(url: &str) -> String {
    Path::new(url)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| ".jpg".to_string())
}
