//! Error types for collection-archiver
//!
//! The taxonomy mirrors how far an error is allowed to travel during a run:
//! - [`Error::Config`] aborts the run before any collection is touched
//! - [`Error::SourceFetch`] abandons one collection, the run continues
//! - [`Error::PageFetch`] is recovered by re-fetching the page (bounded retries)
//! - [`Error::ItemExtract`], [`Error::ImageFetch`] and [`Error::Write`] only affect
//!   a single item or image and are logged and absorbed

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for collection-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for collection-archiver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "global_image_path")
        key: Option<String>,
    },

    /// The item count (or collection setup) could not be obtained for a collection
    #[error("failed to fetch collection {url}: {reason}")]
    SourceFetch {
        /// Collection URL as configured
        url: String,
        /// Why the collection was abandoned
        reason: String,
    },

    /// A listing page could not be fetched
    #[error("failed to fetch page at offset {offset}: {source}")]
    PageFetch {
        /// Offset of the page that failed
        offset: u64,
        /// Underlying transport error
        source: Box<Error>,
    },

    /// A raw record could not be decoded into metadata and body
    #[error("failed to extract item {id}: {reason}")]
    ItemExtract {
        /// Internal identifier of the record (or a placeholder)
        id: String,
        /// Decoder message
        reason: String,
    },

    /// A single embedded image could not be localized
    #[error("failed to fetch image {url}: {reason}")]
    ImageFetch {
        /// Remote image URL
        url: String,
        /// Why the download failed
        reason: String,
    },

    /// A document could not be written to the archive
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Target document path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// No free filename could be allocated for a document
    #[error("no free filename for '{stem}' in {} after {attempts} attempts", dir.display())]
    NameExhausted {
        /// Title stem that was probed
        stem: String,
        /// Directory that was probed
        dir: PathBuf,
        /// Number of candidates tried
        attempts: u32,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote endpoint answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Header block serialization error
    #[error("header error: {0}")]
    Header(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a configuration error attached to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, used in [`SyncEvent`](crate::types::SyncEvent) payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::SourceFetch { .. } => "source_fetch_error",
            Error::PageFetch { .. } => "page_fetch_error",
            Error::ItemExtract { .. } => "item_extract_error",
            Error::ImageFetch { .. } => "image_fetch_error",
            Error::Write { .. } => "write_error",
            Error::NameExhausted { .. } => "name_exhausted",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Http { .. } => "http_error",
            Error::Serialization(_) => "serialization_error",
            Error::Header(_) => "header_error",
        }
    }
}
