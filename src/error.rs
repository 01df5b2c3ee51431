//! Error types for the retrieval core.
//!
//! Only failures that can reach a caller are modelled here. Malformed
//! documents and out-of-range settings are recovered locally.

use thiserror::Error;

/// Failure to obtain documents from a [`DocumentSource`](crate::source::DocumentSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document source misconfigured: {0}")]
    Misconfigured(String),
}

/// Errors returned by the indexer and engine.
#[derive(Debug, Error)]
pub enum LoreError {
    /// The document source could not be read; any previously published index is kept.
    #[error("lore source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
}

pub type LoreResult<T> = std::result::Result<T, LoreError>;
