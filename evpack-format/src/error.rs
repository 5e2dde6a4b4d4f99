//! Error types for evpack

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by errors whose source type lives outside this crate.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// evpack error types
#[derive(Debug, Error)]
pub enum EvpackError {
    /// The input archive could not be expanded.
    #[error("Failed to extract archive {}: {source}", .archive.display())]
    Extraction {
        /// Archive being expanded
        archive: PathBuf,
        /// Underlying archive or filesystem failure
        #[source]
        source: BoxedCause,
    },
    /// The input directory could not be listed.
    #[error("Failed to list input directory {}: {source}", .path.display())]
    ListInputs {
        /// Directory being listed
        path: PathBuf,
        /// Filesystem failure
        #[source]
        source: std::io::Error,
    },
    /// A gzip fragment could not be opened.
    #[error("Failed to open input {}: {source}", .file.display())]
    OpenInput {
        /// Fragment being opened
        file: PathBuf,
        /// Filesystem failure
        #[source]
        source: std::io::Error,
    },
    /// A gzip fragment could not be decompressed.
    #[error("Failed to decompress {}: {source}", .file.display())]
    Decompress {
        /// Fragment being decompressed
        file: PathBuf,
        /// Underlying decoder failure
        #[source]
        source: std::io::Error,
    },
    /// A decompressed chunk is not a valid original record.
    #[error("Invalid record in {} (chunk {chunk_index}): {source}", .file.display())]
    Parse {
        /// Fragment the chunk came from
        file: PathBuf,
        /// Zero-based position of the chunk within the fragment
        chunk_index: usize,
        /// JSON failure
        #[source]
        source: serde_json::Error,
    },
    /// A record URL could not be parsed.
    #[error("Malformed URL '{url}': {source}")]
    MalformedUrl {
        /// Offending URL text
        url: String,
        /// Parser failure
        #[source]
        source: url::ParseError,
    },
    /// An output batch could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// Output file being written
        path: PathBuf,
        /// Filesystem failure
        #[source]
        source: std::io::Error,
    },
    /// The run was cancelled before it finished.
    #[error("Run cancelled after {files_written} output files")]
    Cancelled {
        /// Output files sealed before cancellation
        files_written: usize,
    },
    /// A configured resource limit was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    /// I/O operation failed outside of a more specific stage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing or serialization failed outside of a more specific stage.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvpackError {
    /// Whether the error came from a cancellation request rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EvpackError::Cancelled { .. })
    }

    /// Wrap any archive failure as an [`EvpackError::Extraction`].
    pub fn extraction<E>(archive: impl Into<PathBuf>, source: E) -> Self
    where
        E: Into<BoxedCause>,
    {
        EvpackError::Extraction {
            archive: archive.into(),
            source: source.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EvpackError>;
