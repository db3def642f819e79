//! Metadata tagging seam.
//!
//! The download pipeline calls a [`Tagger`] after each successful track
//! transfer. Tag-writing failures are reported as warnings by the caller and
//! never fail the transfer; the file on disk is already complete.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::model::{Release, Track};

/// Error applying metadata to a downloaded track file.
#[derive(Debug, Error)]
#[error("failed to tag {path}: {reason}")]
pub struct TagError {
    /// The track file that could not be tagged.
    pub path: String,
    /// What went wrong.
    pub reason: String,
}

impl TagError {
    /// Creates a tag error for `path`.
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Writes metadata (and optionally embedded artwork) to a track file.
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Applies release and track metadata to the file at `track_path`.
    ///
    /// `artwork` carries the release cover bytes when available and embedding
    /// is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`TagError`] when the file cannot be tagged.
    async fn apply_metadata(
        &self,
        track_path: &Path,
        release: &Release,
        track: &Track,
        artwork: Option<&[u8]>,
    ) -> Result<(), TagError>;
}

/// Tagger that writes nothing. Used when tag modification is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTagger;

#[async_trait]
impl Tagger for NoopTagger {
    async fn apply_metadata(
        &self,
        track_path: &Path,
        _release: &Release,
        _track: &Track,
        _artwork: Option<&[u8]>,
    ) -> Result<(), TagError> {
        debug!(path = %track_path.display(), "tagging disabled, leaving file untouched");
        Ok(())
    }
}
