//! Numbered batch file output

use evpack_codec::decode_chunk;
use evpack_format::constants::OUTPUT_EXTENSION;
use evpack_format::{EvpackError, Result, TransformedRecord};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Description of one sealed output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFileInfo {
    /// Counter value the file is named after
    pub index: usize,
    /// Location on disk
    pub path: PathBuf,
    /// Records in the file's JSON array
    pub records: usize,
    /// File size in bytes
    pub bytes: u64,
}

/// Writes batches as `0.json`, `1.json`, ... in a single directory.
///
/// The counter starts at zero, advances once per file and is never reused
/// by the same writer.
pub struct BatchFileWriter {
    dir: PathBuf,
    next_index: usize,
    records_written: usize,
    bytes_written: u64,
}

impl BatchFileWriter {
    /// Create a writer targeting `dir`, which must already exist
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_index: 0,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Serialize `records` as one JSON array into the next numbered file
    pub fn write_batch(&mut self, records: &[TransformedRecord]) -> Result<OutputFileInfo> {
        let index = self.next_index;
        let path = output_file_path(&self.dir, index);
        let payload = serde_json::to_vec(records)?;

        let write = |path: &Path| -> std::io::Result<()> {
            let mut out = BufWriter::new(File::create(path)?);
            out.write_all(&payload)?;
            out.flush()
        };
        write(&path).map_err(|source| EvpackError::Write {
            path: path.clone(),
            source,
        })?;

        self.next_index += 1;
        self.records_written += records.len();
        self.bytes_written += payload.len() as u64;

        info!(
            file = %path.display(),
            records = records.len(),
            bytes = payload.len(),
            "output batch written"
        );

        Ok(OutputFileInfo {
            index,
            path,
            records: records.len(),
            bytes: payload.len() as u64,
        })
    }

    /// Files written so far
    pub fn files_written(&self) -> usize {
        self.next_index
    }

    /// Records written so far
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Location of output file `index` in `dir`
pub fn output_file_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.{}", index, OUTPUT_EXTENSION))
}

/// Counter value encoded in an output file name, if it is one
pub fn parse_output_index(path: &Path) -> Option<usize> {
    if path.extension()?.to_str()? != OUTPUT_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Create the output directory if missing; with `clean`, delete stale
/// numbered outputs left by an earlier run. Returns how many were deleted.
pub fn prepare_output_dir(dir: &Path, clean: bool) -> Result<usize> {
    fs::create_dir_all(dir).map_err(|source| EvpackError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    if !clean {
        return Ok(0);
    }

    let mut removed = 0;
    for path in numbered_outputs(dir)? {
        fs::remove_file(&path).map_err(|source| EvpackError::Write {
            path: path.clone(),
            source,
        })?;
        removed += 1;
    }
    if removed > 0 {
        debug!(dir = %dir.display(), removed, "removed stale output files");
    }
    Ok(removed)
}

/// Describe every numbered output file in `dir`, in counter order
pub fn inspect_output(dir: &Path) -> Result<Vec<OutputFileInfo>> {
    let mut infos = Vec::new();
    for path in numbered_outputs(dir)? {
        let Some(index) = parse_output_index(&path) else {
            continue;
        };
        let bytes = fs::read(&path)?;
        let records = decode_chunk(&bytes)?;
        infos.push(OutputFileInfo {
            index,
            path,
            records: records.len(),
            bytes: bytes.len() as u64,
        });
    }
    infos.sort_by_key(|info| info.index);
    Ok(infos)
}

fn numbered_outputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if parse_output_index(&path).is_some() {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evpack_codec::transform_value;
    use serde_json::json;

    fn records(n: usize) -> Vec<TransformedRecord> {
        let events: Vec<_> = (0..n).map(|i| json!({"n": "view", "i": i})).collect();
        transform_value(&json!({"ts": 9, "u": "https://example.com/", "e": events})).unwrap()
    }

    #[test]
    fn numbers_files_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BatchFileWriter::new(dir.path());

        let first = writer.write_batch(&records(2)).unwrap();
        let second = writer.write_batch(&records(1)).unwrap();

        assert_eq!(first.index, 0);
        assert_eq!(first.path, dir.path().join("0.json"));
        assert_eq!(second.index, 1);
        assert_eq!(second.path, dir.path().join("1.json"));
        assert_eq!(writer.files_written(), 2);
        assert_eq!(writer.records_written(), 3);
        assert_eq!(writer.bytes_written(), first.bytes + second.bytes);
    }

    #[test]
    fn empty_batch_is_written_as_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BatchFileWriter::new(dir.path());
        let info = writer.write_batch(&[]).unwrap();
        assert_eq!(fs::read(&info.path).unwrap(), b"[]");
        assert_eq!(info.bytes, 2);
    }

    #[test]
    fn missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BatchFileWriter::new(dir.path().join("absent"));
        match writer.write_batch(&records(1)) {
            Err(EvpackError::Write { path, .. }) => {
                assert_eq!(path, dir.path().join("absent").join("0.json"))
            }
            other => panic!("expected Write error, got {:?}", other),
        }
        assert_eq!(writer.files_written(), 0);
    }

    #[test]
    fn parse_output_index_accepts_only_numbered_json() {
        assert_eq!(parse_output_index(Path::new("out/12.json")), Some(12));
        assert_eq!(parse_output_index(Path::new("out/0.json")), Some(0));
        assert_eq!(parse_output_index(Path::new("out/a.json")), None);
        assert_eq!(parse_output_index(Path::new("out/-1.json")), None);
        assert_eq!(parse_output_index(Path::new("out/3.txt")), None);
        assert_eq!(parse_output_index(Path::new("out/.json")), None);
    }

    #[test]
    fn clean_removes_only_numbered_outputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0.json"), b"[]").unwrap();
        fs::write(dir.path().join("7.json"), b"[]").unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        assert_eq!(prepare_output_dir(dir.path(), false).unwrap(), 0);
        assert_eq!(prepare_output_dir(dir.path(), true).unwrap(), 2);
        assert!(!dir.path().join("0.json").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn inspect_rejects_numbered_file_that_is_not_a_record_array() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0.json"), br#"{"not":"an array"}"#).unwrap();
        assert!(matches!(
            inspect_output(dir.path()),
            Err(EvpackError::Json(_))
        ));
    }

    #[test]
    fn inspect_orders_by_counter_not_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BatchFileWriter::new(dir.path());
        for n in 1..=11 {
            writer.write_batch(&records(n)).unwrap();
        }

        let infos = inspect_output(dir.path()).unwrap();
        let indexes: Vec<usize> = infos.iter().map(|info| info.index).collect();
        assert_eq!(indexes, (0..11).collect::<Vec<_>>());
        assert_eq!(infos[10].records, 11);
    }
}
