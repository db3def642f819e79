//! HTTP capability: text fetches, size probes, and streaming transfers.

mod client;
mod error;

pub use client::{HttpClient, USER_AGENT};
pub use error::FetchError;
