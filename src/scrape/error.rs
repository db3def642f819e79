//! Error types for page scraping and catalog extraction.

use thiserror::Error;

/// Errors raised while resolving listing pages or extracting release data.
///
/// All three variants are fatal only to the single input URL being processed;
/// callers report them and continue with their remaining inputs.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// The expected data was absent (no embedded blob, no release links).
    #[error("not found: {context}")]
    NotFound {
        /// What was being looked for.
        context: String,
    },

    /// The data was present but could not be decoded.
    #[error("malformed page data: {context}")]
    Malformed {
        /// What failed to decode.
        context: String,
    },

    /// A single-release listing matched an unexpected number of anchors.
    #[error("ambiguous release listing: {context}")]
    Ambiguous {
        /// Why the listing was ambiguous.
        context: String,
    },
}

impl ScrapeError {
    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(context: impl Into<String>) -> Self {
        Self::NotFound {
            context: context.into(),
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(context: impl Into<String>) -> Self {
        Self::Malformed {
            context: context.into(),
        }
    }

    /// Creates an `Ambiguous` error.
    #[must_use]
    pub fn ambiguous(context: impl Into<String>) -> Self {
        Self::Ambiguous {
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_messages_carry_context() {
        let err = ScrapeError::not_found("release data in HTML");
        assert!(err.to_string().contains("release data in HTML"));

        let err = ScrapeError::malformed("release JSON: unexpected token");
        assert!(err.to_string().contains("unexpected token"));

        let err = ScrapeError::ambiguous("2 album anchors, expected exactly 1");
        assert!(err.to_string().contains("expected exactly 1"));
    }
}
