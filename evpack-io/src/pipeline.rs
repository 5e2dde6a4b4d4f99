//! Run orchestration: expand, enumerate, stream, batch, write

use crate::archive::{ArchiveExpander, ZipExpander};
use crate::cancel::CancellationToken;
use crate::input::list_input_files;
use crate::reader::ChunkStream;
use crate::writer::{prepare_output_dir, BatchFileWriter, OutputFileInfo};
use crate::{PipelineRequest, PipelineSummary};
use evpack_codec::{BatchBuilder, PushOutcome};
use evpack_format::{EvpackError, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Progress notifications emitted while a pipeline runs
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// An input fragment is about to be streamed
    FileStarted {
        /// Fragment path
        path: &'a Path,
        /// Zero-based position in processing order
        position: usize,
        /// Number of fragments in the run
        total: usize,
    },
    /// A chunk was transformed and offered to the batch
    ChunkProcessed {
        /// Records the chunk carried
        records: usize,
    },
    /// A batch was sealed and written
    BatchWritten(&'a OutputFileInfo),
}

type Observer = Box<dyn FnMut(&ProgressEvent<'_>) + Send>;

/// Single-writer repack pipeline.
///
/// Input fragments are streamed strictly one after another in a fixed order;
/// the batch builder and output counter are owned by the running loop, so no
/// state is shared between fragments other than through that loop.
pub struct Pipeline<E = ZipExpander> {
    request: PipelineRequest,
    expander: E,
    cancel: CancellationToken,
    observer: Option<Observer>,
}

impl Pipeline<ZipExpander> {
    /// Create a pipeline that expands zip archives
    pub fn new(request: PipelineRequest) -> Self {
        let expander = ZipExpander::new(request.options.limits.clone());
        Self::with_expander(request, expander)
    }
}

impl<E: ArchiveExpander> Pipeline<E> {
    /// Create a pipeline with a custom archive expander
    pub fn with_expander(request: PipelineRequest, expander: E) -> Self {
        Self {
            request,
            expander,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    /// Use an externally controlled cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Receive progress notifications
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ProgressEvent<'_>) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Token that cancels this pipeline
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the run to completion, cancellation or the first error
    pub fn run(&mut self) -> Result<PipelineSummary> {
        let start = Instant::now();
        let paths = self.request.paths.clone();
        let options = self.request.options.clone();

        info!(
            input_dir = %paths.input_dir.display(),
            output_dir = %paths.output_dir.display(),
            max_batch_bytes = options.max_batch_bytes,
            flush_policy = options.flush_policy.name(),
            "starting repack run"
        );

        let expanded = match &paths.archive {
            Some(archive) => {
                self.check_cancelled(0)?;
                Some(self.expander.expand(archive, &paths.extract_dir)?)
            }
            None => None,
        };

        prepare_output_dir(&paths.output_dir, options.clean_output)?;
        let inputs = list_input_files(&paths.input_dir, options.sort_inputs)?;
        if inputs.is_empty() {
            warn!(input_dir = %paths.input_dir.display(), "no input fragments found");
        }

        let mut writer = BatchFileWriter::new(&paths.output_dir);
        let mut builder = BatchBuilder::new(options.batch_opts());
        let mut outputs = Vec::new();
        let mut chunks_processed = 0;

        for (position, input) in inputs.iter().enumerate() {
            self.check_cancelled(writer.files_written())?;
            debug!(file = %input.display(), position, "streaming input fragment");
            self.notify(ProgressEvent::FileStarted {
                path: input,
                position,
                total: inputs.len(),
            });

            for chunk in ChunkStream::open(input, &options.limits)? {
                self.check_cancelled(writer.files_written())?;
                let chunk = chunk?;
                chunks_processed += 1;
                self.notify(ProgressEvent::ChunkProcessed {
                    records: chunk.encoded.record_count(),
                });

                if let PushOutcome::Sealed(sealed) = builder.push_chunk(chunk.encoded) {
                    let written = writer.write_batch(&sealed.records)?;
                    self.notify(ProgressEvent::BatchWritten(&written));
                    outputs.push(written);
                }
            }
        }

        let records_dropped = builder.records_dropped();
        let last = builder.finish();
        if last.is_empty() {
            debug!("final batch is empty");
        }
        let written = writer.write_batch(&last.records)?;
        self.notify(ProgressEvent::BatchWritten(&written));
        outputs.push(written);

        let summary = PipelineSummary {
            expanded,
            input_files: inputs.len(),
            chunks_processed,
            records_written: writer.records_written(),
            records_dropped,
            files_written: writer.files_written(),
            bytes_written: writer.bytes_written(),
            outputs,
            elapsed: start.elapsed(),
        };

        info!(
            input_files = summary.input_files,
            files_written = summary.files_written,
            records_written = summary.records_written,
            elapsed = ?summary.elapsed,
            "repack run finished"
        );
        Ok(summary)
    }

    fn check_cancelled(&self, files_written: usize) -> Result<()> {
        if self.cancel.is_cancelled() {
            warn!(files_written, "run cancelled; discarding unsealed batch");
            return Err(EvpackError::Cancelled { files_written });
        }
        Ok(())
    }

    fn notify(&mut self, event: ProgressEvent<'_>) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }
}
