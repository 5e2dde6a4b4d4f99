//! Streaming reader for gzip event-log fragments

use evpack_codec::{encode_chunk, transform_record, EncodedChunk};
use evpack_format::{EvpackError, Limits, OriginalRecord, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One transformed document from a fragment
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based position of the document within its fragment
    pub index: usize,
    /// Transformed records and their wire bytes
    pub encoded: EncodedChunk,
}

/// Lazy, finite, non-restartable sequence of transformed chunks from one
/// gzip fragment.
///
/// The fragment is decompressed as a stream and split into JSON documents
/// laid back to back, with or without whitespace between them. Each document
/// is decoded as an [`OriginalRecord`], fanned out, and encoded as one chunk.
/// The first failure ends the stream.
pub struct ChunkStream {
    path: PathBuf,
    inner: Box<dyn Iterator<Item = serde_json::Result<OriginalRecord>> + Send>,
    limit_hit: Arc<AtomicBool>,
    limit: u64,
    next_index: usize,
    finished: bool,
}

impl ChunkStream {
    /// Open a gzip fragment on disk
    pub fn open(path: impl AsRef<Path>, limits: &Limits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| EvpackError::OpenInput {
            file: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(path, BufReader::new(file), limits))
    }

    /// Stream a gzip fragment from any reader; `path` is used for error context
    pub fn from_reader<R: Read + Send + 'static>(
        path: impl Into<PathBuf>,
        reader: R,
        limits: &Limits,
    ) -> Self {
        let limit = limits.max_decompressed_bytes_per_file;
        let limit_hit = Arc::new(AtomicBool::new(false));
        let decoded = LimitedReader::new(
            MultiGzDecoder::new(reader),
            limit,
            Arc::clone(&limit_hit),
        );
        let inner = serde_json::Deserializer::from_reader(BufReader::new(decoded))
            .into_iter::<OriginalRecord>();

        Self {
            path: path.into(),
            inner: Box::new(inner),
            limit_hit,
            limit,
            next_index: 0,
            finished: false,
        }
    }

    /// Fragment this stream reads
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn classify(&self, err: serde_json::Error, chunk_index: usize) -> EvpackError {
        if self.limit_hit.load(Ordering::Relaxed) {
            return EvpackError::LimitExceeded(format!(
                "{} decompresses past {} bytes",
                self.path.display(),
                self.limit
            ));
        }
        if err.is_io() {
            return EvpackError::Decompress {
                file: self.path.clone(),
                source: io::Error::from(err),
            };
        }
        EvpackError::Parse {
            file: self.path.clone(),
            chunk_index,
            source: err,
        }
    }
}

impl Iterator for ChunkStream {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let decoded = match self.inner.next() {
            Some(decoded) => decoded,
            None => {
                self.finished = true;
                return None;
            }
        };

        let index = self.next_index;
        self.next_index += 1;

        let result = decoded
            .map_err(|err| self.classify(err, index))
            .and_then(|record| transform_record(&record))
            .and_then(encode_chunk)
            .map(|encoded| Chunk { index, encoded });

        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// Reader that fails once more than `limit` bytes would be produced
struct LimitedReader<R> {
    inner: R,
    bytes_read: u64,
    limit: u64,
    exceeded: Arc<AtomicBool>,
}

impl<R> LimitedReader<R> {
    fn new(inner: R, limit: u64, exceeded: Arc<AtomicBool>) -> Self {
        Self {
            inner,
            bytes_read: 0,
            limit,
            exceeded,
        }
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.limit.saturating_sub(self.bytes_read);
        if remaining == 0 {
            // At the limit: only a clean end of stream is acceptable.
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => {
                    self.exceeded.store(true, Ordering::Relaxed);
                    Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("decompressed data exceeds {} bytes", self.limit),
                    ))
                }
            };
        }

        let max_read = remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max_read])?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evpack_test_utils::{gzip_bytes, gzip_documents};
    use serde_json::json;
    use std::io::Cursor;

    fn stream_of(bytes: Vec<u8>) -> ChunkStream {
        ChunkStream::from_reader("fragment.gz", Cursor::new(bytes), &Limits::default())
    }

    #[test]
    fn yields_one_chunk_per_document() {
        let bytes = gzip_documents(&[
            json!({"ts": 1, "u": "https://a.com/", "e": [{"n": "a"}, {"n": "b"}]}),
            json!({"ts": 2, "u": "https://b.com/x", "e": [{"n": "c"}]}),
        ]);

        let chunks: Vec<Chunk> = stream_of(bytes).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].encoded.records.len(), 2);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].encoded.records[0].url_object.domain, "b.com");
    }

    #[test]
    fn accepts_whitespace_between_documents() {
        let raw = b"{\"ts\":1,\"u\":\"https://a.com/\",\"e\":[{\"n\":\"a\"}]}\n\n{\"ts\":2,\"u\":\"https://a.com/\",\"e\":[]}\n";
        let chunks: Vec<Chunk> = stream_of(gzip_bytes(raw)).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].encoded.records.is_empty());
        assert_eq!(chunks[1].encoded.bytes, b"[]");
    }

    #[test]
    fn invalid_document_is_parse_error_and_ends_stream() {
        let raw = b"{\"ts\":1,\"u\":\"https://a.com/\",\"e\":[]}{\"ts\": oops}";
        let mut stream = stream_of(gzip_bytes(raw));

        assert!(stream.next().unwrap().is_ok());
        match stream.next() {
            Some(Err(EvpackError::Parse { chunk_index, file, .. })) => {
                assert_eq!(chunk_index, 1);
                assert_eq!(file, PathBuf::from("fragment.gz"));
            }
            other => panic!("expected Parse, got {:?}", other.map(|r| r.map(|c| c.index))),
        }
        assert!(stream.next().is_none());
    }

    #[test]
    fn malformed_url_fails_the_stream() {
        let bytes = gzip_documents(&[json!({"ts": 1, "u": "::nope::", "e": [{"n": "a"}]})]);
        let mut stream = stream_of(bytes);
        assert!(matches!(
            stream.next(),
            Some(Err(EvpackError::MalformedUrl { .. }))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn corrupt_gzip_is_decompress_error() {
        let mut bytes = gzip_documents(&[json!({"ts": 1, "u": "https://a.com/", "e": []})]);
        let mid = bytes.len() / 2;
        for byte in &mut bytes[10..mid] {
            *byte ^= 0xFF;
        }
        let first = stream_of(bytes).next();
        assert!(matches!(
            first,
            Some(Err(EvpackError::Decompress { .. })) | Some(Err(EvpackError::Parse { .. }))
        ));
    }

    #[test]
    fn decompressed_size_limit_is_enforced() {
        let events: Vec<_> = (0..200).map(|i| json!({"n": "view", "i": i})).collect();
        let bytes = gzip_documents(&[json!({"ts": 1, "u": "https://a.com/", "e": events})]);
        let limits = Limits {
            max_decompressed_bytes_per_file: 256,
            ..Limits::default()
        };

        let mut stream = ChunkStream::from_reader("big.gz", Cursor::new(bytes), &limits);
        assert!(matches!(
            stream.next(),
            Some(Err(EvpackError::LimitExceeded(_)))
        ));
    }

    #[test]
    fn unopenable_fragment_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.gz");
        match ChunkStream::open(&missing, &Limits::default()) {
            Err(EvpackError::OpenInput { file, .. }) => assert_eq!(file, missing),
            Err(other) => panic!("expected OpenInput, got {:?}", other),
            Ok(_) => panic!("expected OpenInput, got a stream"),
        }
    }

    #[test]
    fn concatenated_gzip_members_are_read_through() {
        let mut bytes = gzip_documents(&[json!({"ts": 1, "u": "https://a.com/", "e": [{"n": "a"}]})]);
        bytes.extend(gzip_documents(&[json!({"ts": 2, "u": "https://a.com/", "e": [{"n": "b"}]})]));
        let chunks: Vec<Chunk> = stream_of(bytes).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 2);
    }
}
