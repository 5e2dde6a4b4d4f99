//! Chunk encoding: the transformed records of one source document

use evpack_format::{Result, TransformedRecord};

/// Transformed records of one decompressed document plus their wire bytes.
///
/// `bytes` is the compact JSON array of `records`; its length is what the
/// batch byte budget is charged for.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    /// Records in event order
    pub records: Vec<TransformedRecord>,
    /// Compact JSON array encoding of `records`
    pub bytes: Vec<u8>,
}

impl EncodedChunk {
    /// Byte length charged against the batch budget
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Number of transformed records in the chunk
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Serialize transformed records into a single compact JSON array chunk.
pub fn encode_chunk(records: Vec<TransformedRecord>) -> Result<EncodedChunk> {
    let bytes = serde_json::to_vec(&records)?;
    Ok(EncodedChunk { records, bytes })
}

/// Parse a chunk's wire bytes back into transformed records.
pub fn decode_chunk(bytes: &[u8]) -> Result<Vec<TransformedRecord>> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transform_value;
    use serde_json::json;

    #[test]
    fn empty_chunk_is_two_bytes() {
        let chunk = encode_chunk(Vec::new()).unwrap();
        assert_eq!(chunk.bytes, b"[]");
        assert_eq!(chunk.byte_len(), 2);
        assert_eq!(chunk.record_count(), 0);
    }

    #[test]
    fn chunk_bytes_decode_to_same_records() {
        let records = transform_value(&json!({
            "ts": 5,
            "u": "https://example.com/a?x=1#top",
            "e": [{"n": "click"}, {"n": "scroll", "d": 40}]
        }))
        .unwrap();

        let chunk = encode_chunk(records.clone()).unwrap();
        assert_eq!(decode_chunk(&chunk.bytes).unwrap(), records);
        assert_eq!(chunk.byte_len(), serde_json::to_vec(&records).unwrap().len());
    }
}
