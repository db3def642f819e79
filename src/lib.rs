//! Bandcamp Downloader Core Library
//!
//! This library turns a small set of seed release or artist URLs into a
//! structured catalog of media releases and materializes them as local files
//! with correct metadata.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`model`] - Releases, tracks, naming templates, and path computation
//! - [`scrape`] - URL classification, discography resolution, page extraction
//! - [`fetch`] - HTTP client with streaming transfers and size probes
//! - [`download`] - Concurrent download orchestration with retry and progress
//! - [`tag`] - Metadata tagging seam
//! - [`config`] - JSON settings with defaults

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod fetch;
pub mod model;
pub mod scrape;
pub mod tag;

// Re-export commonly used types
pub use config::{Settings, SettingsError};
pub use download::{
    DownloadManager, EventReceiver, ManagerError, ProgressEvent, ProgressLevel, ProgressSnapshot,
    ProgressState, RetryPolicy, TransferJob,
};
pub use fetch::{FetchError, HttpClient, USER_AGENT};
pub use model::{NamingConfig, Release, Track, sanitize_file_name};
pub use scrape::{ScrapeError, UrlKind, classify_url, extract_catalog, resolve_leaf_urls};
pub use tag::{NoopTagger, TagError, Tagger};
