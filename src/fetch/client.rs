//! HTTP client wrapper for page fetches, size probes, and streaming file
//! transfers.
//!
//! One client is created per run and reused everywhere, taking advantage of
//! connection pooling. Every request carries the fixed identifying
//! User-Agent, and file transfers stream to disk without buffering the whole
//! body in memory.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;

/// Identifying User-Agent sent with every request.
pub const USER_AGENT: &str = "BandcampDownloader";

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout in seconds, sized for large audio files.
const READ_TIMEOUT_SECS: u64 = 300;

/// HTTP client for release pages and asset transfers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new client with the fixed User-Agent and default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(std::time::Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a URL and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URLs, network failures, or non-200
    /// responses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get_ok(url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::network(url, e))
    }

    /// Fetches a URL fully into memory. Intended for small assets such as
    /// cover art; large transfers go through [`download_to_file`](Self::download_to_file).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URLs, network failures, or non-200
    /// responses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get_ok(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e))?;
        Ok(bytes.to_vec())
    }

    /// Probes the size of a remote asset via a HEAD request.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingLength`] when the server sends no
    /// Content-Length, plus the usual transport errors.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_size(&self, url: &str) -> Result<u64, FetchError> {
        validate_url(url)?;
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::http_status(url, response.status().as_u16()));
        }

        response
            .content_length()
            .ok_or_else(|| FetchError::missing_length(url))
    }

    /// Streams a remote asset to `dest`, calling `on_chunk` with the size of
    /// each chunk as it is written. The file is created (or truncated) at the
    /// start of the transfer.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failures or disk write errors.
    #[instrument(skip(self, on_chunk), fields(url = %url, dest = %dest.display()))]
    pub async fn download_to_file<F>(
        &self,
        url: &str,
        dest: &Path,
        mut on_chunk: F,
    ) -> Result<u64, FetchError>
    where
        F: FnMut(u64) + Send,
    {
        let response = self.get_ok(url).await?;

        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        let mut writer = BufWriter::new(file);

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(dest, e))?;
            written += chunk.len() as u64;
            on_chunk(chunk.len() as u64);
        }

        writer.flush().await.map_err(|e| FetchError::io(dest, e))?;

        debug!(bytes = written, "transfer complete");
        Ok(written)
    }

    /// Sends a GET and enforces the 200-only policy.
    async fn get_ok(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        validate_url(url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }
}

fn validate_url(url: &str) -> Result<(), FetchError> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|_| FetchError::invalid_url(url))
}
