//! Batch builder for accumulating chunks under a byte budget

use crate::{BatchOpts, EncodedChunk};
use evpack_format::{FlushPolicy, TransformedRecord};
use std::mem;
use tracing::{debug, warn};

/// Outcome of offering a chunk to a [`BatchBuilder`]
#[derive(Debug)]
pub enum PushOutcome {
    /// The chunk fit the current batch
    Appended,
    /// The chunk did not fit; the previous batch was sealed and must be written
    Sealed(SealedBatch),
}

/// A batch closed to further chunks, ready to be written as one output file
#[derive(Debug, Clone, PartialEq)]
pub struct SealedBatch {
    /// Records in processing order
    pub records: Vec<TransformedRecord>,
    /// Raw chunk bytes charged to this batch
    pub byte_size: usize,
    /// Number of chunks charged to this batch
    pub chunk_count: usize,
}

impl SealedBatch {
    /// Whether the batch carries no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates encoded chunks and seals a batch whenever the next chunk would
/// push the running byte total past the budget.
///
/// The comparison is made against the sum of raw chunk lengths, not against
/// the serialized size of the batch. State carries across source files; only
/// a seal or [`BatchBuilder::finish`] resets it.
pub struct BatchBuilder {
    /// Batch options
    opts: BatchOpts,
    /// Records in the open batch
    records: Vec<TransformedRecord>,
    /// Raw chunk bytes charged to the open batch
    byte_size: usize,
    /// Chunks charged to the open batch
    chunk_count: usize,
    /// Batches sealed so far
    batches_sealed: usize,
    /// Records discarded under [`FlushPolicy::DropTriggering`]
    records_dropped: usize,
}

impl BatchBuilder {
    /// Create new batch builder
    pub fn new(opts: BatchOpts) -> Self {
        Self {
            opts,
            records: Vec::new(),
            byte_size: 0,
            chunk_count: 0,
            batches_sealed: 0,
            records_dropped: 0,
        }
    }

    /// Offer the next chunk in processing order
    pub fn push_chunk(&mut self, chunk: EncodedChunk) -> PushOutcome {
        let size = chunk.byte_len();
        let over_budget = self.byte_size + size > self.opts.max_batch_bytes;

        if size > self.opts.max_batch_bytes {
            warn!(
                chunk_bytes = size,
                max_batch_bytes = self.opts.max_batch_bytes,
                "chunk alone exceeds the batch byte budget"
            );
        }

        if over_budget && self.may_seal() {
            let sealed = self.take_open_batch();
            self.byte_size = size;
            self.chunk_count = 1;
            if self.opts.flush_policy.keeps_triggering_records() {
                self.records = chunk.records;
            } else {
                self.records_dropped += chunk.records.len();
                debug!(
                    dropped = chunk.records.len(),
                    "triggering chunk counted without its records"
                );
            }
            debug!(
                batch = self.batches_sealed - 1,
                records = sealed.records.len(),
                byte_size = sealed.byte_size,
                "batch sealed"
            );
            return PushOutcome::Sealed(sealed);
        }

        self.records.extend(chunk.records);
        self.byte_size += size;
        self.chunk_count += 1;
        PushOutcome::Appended
    }

    /// Seal whatever is open, even if empty; this is the end-of-run batch
    pub fn finish(mut self) -> SealedBatch {
        self.take_open_batch()
    }

    /// Raw chunk bytes charged to the open batch
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Records in the open batch
    pub fn records(&self) -> &[TransformedRecord] {
        &self.records
    }

    /// Batches sealed so far
    pub fn batches_sealed(&self) -> usize {
        self.batches_sealed
    }

    /// Records discarded by the drop-triggering policy so far
    pub fn records_dropped(&self) -> usize {
        self.records_dropped
    }

    fn may_seal(&self) -> bool {
        match self.opts.flush_policy {
            FlushPolicy::Carry => !self.records.is_empty(),
            FlushPolicy::DropTriggering => true,
        }
    }

    fn take_open_batch(&mut self) -> SealedBatch {
        self.batches_sealed += 1;
        SealedBatch {
            records: mem::take(&mut self.records),
            byte_size: mem::take(&mut self.byte_size),
            chunk_count: mem::take(&mut self.chunk_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode_chunk, transform_value};
    use serde_json::json;

    fn chunk(id: i64, events: usize) -> EncodedChunk {
        let events: Vec<_> = (0..events).map(|i| json!({"n": "view", "i": i})).collect();
        let records =
            transform_value(&json!({"ts": id, "u": "https://example.com/", "e": events})).unwrap();
        encode_chunk(records).unwrap()
    }

    fn opts(max_batch_bytes: usize, flush_policy: FlushPolicy) -> BatchOpts {
        BatchOpts {
            max_batch_bytes,
            flush_policy,
        }
    }

    #[test]
    fn test_batch_builder_appends_within_budget() {
        let c = chunk(1, 2);
        let size = c.byte_len();
        let mut builder = BatchBuilder::new(opts(size * 2, FlushPolicy::Carry));

        assert!(matches!(builder.push_chunk(c.clone()), PushOutcome::Appended));
        assert!(matches!(builder.push_chunk(c), PushOutcome::Appended));
        assert_eq!(builder.byte_size(), size * 2);
        assert_eq!(builder.records().len(), 4);
    }

    #[test]
    fn test_batch_builder_budget_is_strictly_greater() {
        let c = chunk(1, 1);
        let size = c.byte_len();
        let mut builder = BatchBuilder::new(opts(size * 3, FlushPolicy::Carry));
        for _ in 0..3 {
            assert!(matches!(builder.push_chunk(c.clone()), PushOutcome::Appended));
        }
        assert!(matches!(builder.push_chunk(c), PushOutcome::Sealed(_)));
    }

    #[test]
    fn test_batch_builder_carry_moves_trigger_into_next_batch() {
        let first = chunk(1, 1);
        let second = chunk(2, 1);
        let size = first.byte_len();
        let mut builder = BatchBuilder::new(opts(size, FlushPolicy::Carry));

        assert!(matches!(builder.push_chunk(first), PushOutcome::Appended));
        let sealed = match builder.push_chunk(second.clone()) {
            PushOutcome::Sealed(sealed) => sealed,
            PushOutcome::Appended => panic!("expected seal"),
        };
        assert_eq!(sealed.records.len(), 1);
        assert_eq!(sealed.records[0].timestamp, 1);
        assert_eq!(sealed.byte_size, size);
        assert_eq!(sealed.chunk_count, 1);

        assert_eq!(builder.records(), second.records.as_slice());
        assert_eq!(builder.byte_size(), second.byte_len());

        let last = builder.finish();
        assert_eq!(last.records[0].timestamp, 2);
        assert_eq!(builder_dropped_after(FlushPolicy::Carry), 0);
    }

    fn builder_dropped_after(policy: FlushPolicy) -> usize {
        let c = chunk(1, 3);
        let mut builder = BatchBuilder::new(opts(c.byte_len(), policy));
        builder.push_chunk(c.clone());
        builder.push_chunk(c);
        builder.records_dropped()
    }

    #[test]
    fn test_batch_builder_drop_triggering_counts_size_only() {
        let first = chunk(1, 1);
        let second = chunk(2, 1);
        let size = first.byte_len();
        let mut builder = BatchBuilder::new(opts(size, FlushPolicy::DropTriggering));

        builder.push_chunk(first);
        let sealed = match builder.push_chunk(second.clone()) {
            PushOutcome::Sealed(sealed) => sealed,
            PushOutcome::Appended => panic!("expected seal"),
        };
        assert_eq!(sealed.records[0].timestamp, 1);
        assert!(builder.records().is_empty());
        assert_eq!(builder.byte_size(), second.byte_len());
        assert_eq!(builder.records_dropped(), 1);
        assert_eq!(builder_dropped_after(FlushPolicy::DropTriggering), 3);
    }

    #[test]
    fn test_batch_builder_carry_never_seals_empty_batch() {
        let big = chunk(1, 20);
        let mut builder = BatchBuilder::new(opts(big.byte_len() / 2, FlushPolicy::Carry));

        assert!(matches!(builder.push_chunk(big.clone()), PushOutcome::Appended));
        match builder.push_chunk(big) {
            PushOutcome::Sealed(sealed) => assert_eq!(sealed.records.len(), 20),
            PushOutcome::Appended => panic!("oversized batch should seal"),
        }
        assert_eq!(builder.batches_sealed(), 1);
    }

    #[test]
    fn test_batch_builder_drop_triggering_seals_empty_first_batch() {
        let big = chunk(1, 20);
        let mut builder = BatchBuilder::new(opts(big.byte_len() / 2, FlushPolicy::DropTriggering));

        match builder.push_chunk(big) {
            PushOutcome::Sealed(sealed) => {
                assert!(sealed.is_empty());
                assert_eq!(sealed.byte_size, 0);
            }
            PushOutcome::Appended => panic!("reference behavior seals the empty batch"),
        }
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_batch_builder_empty_chunks_charge_bytes() {
        let empty = encode_chunk(Vec::new()).unwrap();
        let mut builder = BatchBuilder::new(BatchOpts::default());
        builder.push_chunk(empty.clone());
        builder.push_chunk(empty);
        assert_eq!(builder.byte_size(), 4);
        assert!(builder.records().is_empty());
    }

    #[test]
    fn test_batch_builder_finish_empty() {
        let builder = BatchBuilder::new(BatchOpts::default());
        let sealed = builder.finish();
        assert!(sealed.is_empty());
        assert_eq!(sealed.byte_size, 0);
        assert_eq!(sealed.chunk_count, 0);
    }
}
