//! evpack I/O - Streaming file I/O and the high-level run API
//!
//! This crate provides the I/O layer of the event-log repacker:
//!
//! - Zip archive expansion
//! - Input fragment enumeration
//! - Streaming gzip decoding into transformed chunks
//! - Numbered batch file output and inspection
//! - The single-writer pipeline tying them together, with cancellation

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod cancel;
pub mod input;
pub mod pipeline;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use archive::{ArchiveExpander, ExpandSummary, ZipExpander};
pub use cancel::CancellationToken;
pub use evpack_codec::BatchOpts;
pub use evpack_format::constants::{
    DEFAULT_ARCHIVE_PATH, DEFAULT_EXTRACT_DIR, DEFAULT_INPUT_DIR, DEFAULT_MAX_BATCH_BYTES,
    DEFAULT_OUTPUT_DIR,
};
pub use evpack_format::{EvpackError, FlushPolicy, Limits, Result, TransformedRecord};
pub use input::list_input_files;
pub use pipeline::{Pipeline, ProgressEvent};
pub use reader::{Chunk, ChunkStream};
pub use writer::{inspect_output, BatchFileWriter, OutputFileInfo};

use std::path::PathBuf;
use std::time::Duration;

/// Filesystem locations used by a run
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    /// Archive to expand first; `None` reads an already expanded input directory
    pub archive: Option<PathBuf>,
    /// Directory the archive is expanded into
    pub extract_dir: PathBuf,
    /// Directory holding the gzip fragments
    pub input_dir: PathBuf,
    /// Directory receiving `0.json`, `1.json`, ...
    pub output_dir: PathBuf,
}

impl Default for PipelinePaths {
    fn default() -> Self {
        Self {
            archive: Some(PathBuf::from(DEFAULT_ARCHIVE_PATH)),
            extract_dir: PathBuf::from(DEFAULT_EXTRACT_DIR),
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// High-level run options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Byte budget per output batch, charged in raw chunk bytes
    pub max_batch_bytes: usize,
    /// Handling of the chunk that overflows a batch
    pub flush_policy: FlushPolicy,
    /// Process fragments in file-name order
    pub sort_inputs: bool,
    /// Delete numbered outputs from earlier runs before writing
    pub clean_output: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            flush_policy: FlushPolicy::Carry,
            sort_inputs: true,
            clean_output: false,
            limits: Limits::default(),
        }
    }
}

impl PipelineOptions {
    /// Batch builder options derived from these run options
    pub fn batch_opts(&self) -> BatchOpts {
        BatchOpts {
            max_batch_bytes: self.max_batch_bytes,
            flush_policy: self.flush_policy,
        }
    }
}

/// Request describing one repack run
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// Filesystem locations
    pub paths: PipelinePaths,
    /// Run options
    pub options: PipelineOptions,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    /// Archive expansion result, when an archive was expanded
    pub expanded: Option<ExpandSummary>,
    /// Fragments streamed
    pub input_files: usize,
    /// Documents decoded across all fragments
    pub chunks_processed: usize,
    /// Records written across all output files
    pub records_written: usize,
    /// Records discarded by [`FlushPolicy::DropTriggering`]
    pub records_dropped: usize,
    /// Output files written
    pub files_written: usize,
    /// Output bytes written
    pub bytes_written: u64,
    /// Every output file, in counter order
    pub outputs: Vec<OutputFileInfo>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// Run a repack request to completion with the zip expander
pub fn execute_pipeline(request: PipelineRequest) -> Result<PipelineSummary> {
    Pipeline::new(request).run()
}
