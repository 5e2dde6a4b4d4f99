//! evpack Codec - Record transform and batch engines
//!
//! This crate provides the pure, I/O-free engines of the repacker:
//!
//! - The per-record transform that fans one original record out into one
//!   transformed record per event
//! - Chunk encoding of transformed records into compact JSON arrays
//! - The batch builder that accumulates chunks under a byte budget

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod batch_builder;
pub mod chunk;
pub mod transform;

// Re-export commonly used types
pub use evpack_format::{
    EvpackError, FlushPolicy, OriginalRecord, Result, TransformedRecord, UrlObject,
};

// Re-export our own types
pub use batch_builder::{BatchBuilder, PushOutcome, SealedBatch};
pub use chunk::{decode_chunk, encode_chunk, EncodedChunk};
pub use transform::{transform_record, transform_value};

/// Batch building options
#[derive(Debug, Clone)]
pub struct BatchOpts {
    /// Byte budget per batch, charged in raw chunk bytes
    pub max_batch_bytes: usize,
    /// Handling of the chunk that overflows the budget
    pub flush_policy: FlushPolicy,
}

impl Default for BatchOpts {
    fn default() -> Self {
        Self {
            max_batch_bytes: evpack_format::constants::DEFAULT_MAX_BATCH_BYTES,
            flush_policy: FlushPolicy::default(),
        }
    }
}
