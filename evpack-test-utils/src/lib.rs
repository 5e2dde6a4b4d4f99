//! evpack Test Utilities
//!
//! Shared fixtures for evpack tests: original records, gzip fragments,
//! zip archives laid out like a real input, and helpers for reading the
//! numbered output files back.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Builder for original event-log documents (`ts`, `u`, `e`)
pub struct OriginalRecordBuilder {
    timestamp: i64,
    url: String,
    events: Option<Vec<Value>>,
}

impl OriginalRecordBuilder {
    /// Start a document for `url` with timestamp zero and no events
    pub fn new(url: &str) -> Self {
        Self {
            timestamp: 0,
            url: url.to_string(),
            events: Some(Vec::new()),
        }
    }

    /// Set the timestamp
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Append an event object
    pub fn event(mut self, event: Value) -> Self {
        self.events.get_or_insert_with(Vec::new).push(event);
        self
    }

    /// Append a small event carrying a name and a sequence number
    pub fn named_event(self, name: &str, seq: usize) -> Self {
        let mut event = Map::new();
        event.insert("n".to_string(), Value::String(name.to_string()));
        event.insert("seq".to_string(), Value::from(seq));
        self.event(Value::Object(event))
    }

    /// Leave the `e` field out entirely
    pub fn without_events(mut self) -> Self {
        self.events = None;
        self
    }

    /// Build the document
    pub fn build(self) -> Value {
        let mut doc = Map::new();
        doc.insert("ts".to_string(), Value::from(self.timestamp));
        doc.insert("u".to_string(), Value::String(self.url));
        if let Some(events) = self.events {
            doc.insert("e".to_string(), Value::Array(events));
        }
        Value::Object(doc)
    }
}

/// Generate event-log documents with realistic variety
pub struct EventLogGenerator;

impl EventLogGenerator {
    /// `count` documents, each with `events_per_doc` events, cycling through
    /// a handful of hosts, paths and query strings
    pub fn documents(count: usize, events_per_doc: usize) -> Vec<Value> {
        const URLS: [&str; 4] = [
            "https://shop.example.com/cart?item=42&ref=mail",
            "http://localhost:8080/health",
            "https://docs.example.org/guide/intro#install",
            "https://example.net/search?q=rust&q=zip&page=2",
        ];
        const NAMES: [&str; 3] = ["view", "click", "scroll"];

        (0..count)
            .map(|i| {
                (0..events_per_doc).fold(
                    OriginalRecordBuilder::new(URLS[i % URLS.len()])
                        .timestamp(1_700_000_000 + i as i64),
                    |doc, j| doc.named_event(NAMES[(i + j) % NAMES.len()], i * events_per_doc + j),
                )
                .build()
            })
            .collect()
    }
}

/// Gzip-compress `data` as a single member
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to in-memory encoder");
    encoder.finish().expect("finish in-memory encoder")
}

/// Gzip a stream of documents serialized compactly and laid back to back
pub fn gzip_documents(docs: &[Value]) -> Vec<u8> {
    let mut raw = Vec::new();
    for doc in docs {
        serde_json::to_writer(&mut raw, doc).expect("serialize document");
    }
    gzip_bytes(&raw)
}

/// Write `docs` as a gzip fragment named `name` inside `dir`
pub fn write_gzip_fragment(dir: &Path, name: &str, docs: &[Value]) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, gzip_documents(docs))?;
    Ok(path)
}

/// Build a deflated zip archive at `path` holding the given members.
///
/// Member names ending in `/` become directory entries.
pub fn build_zip_archive(path: &Path, entries: &[(&str, Vec<u8>)]) -> io::Result<()> {
    let mut writer = zip::ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).map_err(zip_to_io)?;
            continue;
        }
        writer.start_file(*name, options).map_err(zip_to_io)?;
        writer.write_all(data)?;
    }
    writer.finish().map_err(zip_to_io)?;
    Ok(())
}

/// Build an archive shaped like the real input: an `input/` directory of
/// gzip fragments, one per `(name, docs)` pair
pub fn build_event_archive(path: &Path, fragments: &[(&str, Vec<Value>)]) -> io::Result<()> {
    let names: Vec<String> = fragments
        .iter()
        .map(|(name, _)| format!("input/{}", name))
        .collect();
    let mut entries: Vec<(&str, Vec<u8>)> = vec![("input/", Vec::new())];
    for (name, (_, docs)) in names.iter().zip(fragments) {
        entries.push((name.as_str(), gzip_documents(docs)));
    }
    build_zip_archive(path, &entries)
}

/// Read every numbered output file in `dir` in counter order, returning
/// each file's parsed JSON array
pub fn read_output_files(dir: &Path) -> io::Result<Vec<Vec<Value>>> {
    let mut numbered = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".json"))
            .and_then(|stem| stem.parse::<usize>().ok());
        if let Some(index) = index {
            numbered.push((index, path));
        }
    }
    numbered.sort_by_key(|(index, _)| *index);

    numbered
        .into_iter()
        .map(|(_, path)| {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes).map_err(io::Error::from)
        })
        .collect()
}

/// All output records in `dir`, concatenated in counter order
pub fn read_output_records(dir: &Path) -> io::Result<Vec<Value>> {
    Ok(read_output_files(dir)?.into_iter().flatten().collect())
}

fn zip_to_io(err: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// Utility functions for test assertions
pub mod assertions {
    use serde_json::Value;

    /// Assert that every output file is within `max_bytes`, except files
    /// holding a single oversized chunk, which the caller lists in `allowed`
    pub fn assert_files_within_budget(files: &[Vec<Value>], max_bytes: usize, allowed: &[usize]) {
        for (index, records) in files.iter().enumerate() {
            if allowed.contains(&index) {
                continue;
            }
            let size = serde_json::to_vec(records).map(|v| v.len()).unwrap_or(0);
            if size > max_bytes {
                panic!(
                    "output file {}.json is {} bytes, budget is {}",
                    index, size, max_bytes
                );
            }
        }
    }
}
