//! Settings: JSON-backed run configuration with defaults and validation.
//!
//! A missing settings file is not an error; every field has a default so a
//! first run works without any configuration. CLI flags override individual
//! fields after loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::download::RetryPolicy;
use crate::model::NamingConfig;

/// Default limit on concurrently processed releases.
pub const DEFAULT_MAX_CONCURRENT_RELEASES: usize = 1;

/// Default limit on concurrent transfers within one release.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 10;

/// Default retry attempt budget per transfer.
pub const DEFAULT_DOWNLOAD_MAX_RETRIES: u32 = 7;

/// Default base cooldown between retries, in seconds.
pub const DEFAULT_DOWNLOAD_RETRY_COOLDOWN: f64 = 0.2;

/// Default backoff multiplier applied per retry.
pub const DEFAULT_DOWNLOAD_RETRY_EXPONENT: f64 = 4.0;

/// Default relative size tolerance for skipping existing files.
pub const DEFAULT_ALLOWED_FILE_SIZE_DIFFERENCE: f64 = 0.05;

/// Errors loading or saving the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File system error reading or writing the settings file.
    #[error("IO error on settings file {path}: {source}")]
    Io {
        /// The settings file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file exists but is not valid JSON for [`Settings`].
    #[error("invalid settings file {path}: {source}")]
    Parse {
        /// The settings file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A field value is outside its accepted range.
    #[error("invalid settings value for `{field}`: {reason}")]
    Invalid {
        /// The offending field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Run configuration: naming templates, concurrency limits, retry knobs,
/// and feature flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory template for release folders.
    pub downloads_path: String,
    /// File-name template for track files.
    pub file_name_format: String,
    /// File-name template (without extension) for saved cover art.
    pub cover_art_file_name_format: String,
    /// File-name template (without extension) for playlist files.
    pub playlist_file_name_format: String,
    /// Save cover art as a file in the release folder.
    pub save_cover_art_in_folder: bool,
    /// Embed cover art in track tags.
    pub save_cover_art_in_tags: bool,
    /// Write metadata tags to downloaded tracks.
    pub modify_tags: bool,
    /// Expand artist root URLs into their full discography.
    pub download_artist_discography: bool,
    /// Limit on concurrently processed releases.
    pub max_concurrent_releases: usize,
    /// Limit on concurrent transfers within one release.
    pub max_concurrent_transfers: usize,
    /// Retry attempt budget per transfer.
    pub download_max_retries: u32,
    /// Base cooldown between retries, in seconds.
    pub download_retry_cooldown: f64,
    /// Backoff multiplier applied per retry.
    pub download_retry_exponent: f64,
    /// Relative size tolerance for skipping files that already exist.
    pub allowed_file_size_difference: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            downloads_path: default_downloads_path(),
            file_name_format: "{tracknum} {artist} - {title}.mp3".to_string(),
            cover_art_file_name_format: "{album}".to_string(),
            playlist_file_name_format: "{album}".to_string(),
            save_cover_art_in_folder: false,
            save_cover_art_in_tags: false,
            modify_tags: true,
            download_artist_discography: false,
            max_concurrent_releases: DEFAULT_MAX_CONCURRENT_RELEASES,
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            download_max_retries: DEFAULT_DOWNLOAD_MAX_RETRIES,
            download_retry_cooldown: DEFAULT_DOWNLOAD_RETRY_COOLDOWN,
            download_retry_exponent: DEFAULT_DOWNLOAD_RETRY_EXPONENT,
            allowed_file_size_difference: DEFAULT_ALLOWED_FILE_SIZE_DIFFERENCE,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the file exists but cannot be read,
    /// parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self =
            serde_json::from_str(&raw).map_err(|e| SettingsError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes the settings to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        // Serializing a plain struct of strings and numbers cannot fail.
        let raw = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, raw).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Validates field values against their accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_concurrent_releases == 0 {
            return Err(invalid("max_concurrent_releases", "must be at least 1"));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(invalid("max_concurrent_transfers", "must be at least 1"));
        }
        if self.download_max_retries == 0 {
            return Err(invalid("download_max_retries", "must be at least 1"));
        }
        if !self.download_retry_cooldown.is_finite() || self.download_retry_cooldown < 0.0 {
            return Err(invalid(
                "download_retry_cooldown",
                "must be a non-negative number of seconds",
            ));
        }
        if !self.download_retry_exponent.is_finite() || self.download_retry_exponent < 1.0 {
            return Err(invalid("download_retry_exponent", "must be at least 1.0"));
        }
        if !self.allowed_file_size_difference.is_finite()
            || self.allowed_file_size_difference < 0.0
        {
            return Err(invalid(
                "allowed_file_size_difference",
                "must be a non-negative fraction",
            ));
        }
        Ok(())
    }

    /// Naming templates derived from these settings.
    #[must_use]
    pub fn naming(&self) -> NamingConfig {
        NamingConfig {
            downloads_path: self.downloads_path.clone(),
            track_file_format: self.file_name_format.clone(),
            cover_file_format: self.cover_art_file_name_format.clone(),
            playlist_file_format: self.playlist_file_name_format.clone(),
        }
    }

    /// Retry policy derived from these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.download_max_retries,
            Duration::from_secs_f64(self.download_retry_cooldown),
            self.download_retry_exponent,
        )
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Default release-folder template rooted at the user's music directory.
fn default_downloads_path() -> String {
    let root = dirs::audio_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    format!("{}/{{artist}}/{{album}}", root.display())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.max_concurrent_releases, 1);
        assert_eq!(settings.max_concurrent_transfers, 10);
        assert_eq!(settings.download_max_retries, 7);
        assert!((settings.download_retry_cooldown - 0.2).abs() < f64::EPSILON);
        assert!((settings.download_retry_exponent - 4.0).abs() < f64::EPSILON);
        assert!((settings.allowed_file_size_difference - 0.05).abs() < f64::EPSILON);
        assert!(settings.modify_tags);
        assert!(!settings.download_artist_discography);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.max_concurrent_transfers, 10);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.max_concurrent_transfers = 3;
        settings.download_artist_discography = true;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.max_concurrent_transfers, 3);
        assert!(loaded.download_artist_discography);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"max_concurrent_transfers": 2}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.max_concurrent_transfers, 2);
        assert_eq!(settings.download_max_retries, 7);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut settings = Settings::default();
        settings.max_concurrent_transfers = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_transfers"));
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let mut settings = Settings::default();
        settings.allowed_file_size_difference = -0.1;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("allowed_file_size_difference"));
    }

    #[test]
    fn test_retry_policy_derivation() {
        let settings = Settings::default();
        let policy = settings.retry_policy();
        assert_eq!(policy.max_attempts(), 7);
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(800));
    }
}
