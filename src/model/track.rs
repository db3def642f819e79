//! A single downloadable track within a release.

use std::path::PathBuf;

/// One track of a [`Release`](super::Release).
///
/// Tracks are owned by their parent release; path computation happens when the
/// track is attached (see [`Release::push_track`](super::Release::push_track))
/// and the result is never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Track number (1-indexed).
    pub number: u32,
    /// Disc number. Multi-disc pages are not distinguished yet, so this is 1.
    pub disc: u32,
    /// Track title.
    pub title: String,
    /// Track length in fractional seconds.
    pub duration: f64,
    /// Song lyrics, when the page carries them.
    pub lyrics: Option<String>,
    /// URL of the audio asset to download.
    pub audio_url: String,
    /// Computed local file path, including extension.
    pub path: PathBuf,
}

impl Track {
    /// Returns the file-name portion of the computed path for display.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.title.clone())
    }
}
