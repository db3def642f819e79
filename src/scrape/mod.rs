//! Page scraping: URL classification, discography resolution, and
//! release-page extraction.
//!
//! Everything in this module is a pure function over already-fetched HTML;
//! network access lives in [`fetch`](crate::fetch) and sequencing in
//! [`download`](crate::download).

mod classifier;
mod discography;
mod dto;
mod error;
mod extractor;

pub use classifier::{UrlKind, classify_url};
pub use discography::resolve_leaf_urls;
pub use error::ScrapeError;
pub use extractor::extract_catalog;
