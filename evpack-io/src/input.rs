//! Enumeration of compressed input fragments

use evpack_format::{EvpackError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// List the fragment files directly inside `dir`.
///
/// Subdirectories and hidden files are skipped. With `sort`, paths are
/// ordered by file name so repeated runs see the same sequence; without it
/// the platform's directory order is kept.
pub fn list_input_files(dir: &Path, sort: bool) -> Result<Vec<PathBuf>> {
    let list_err = |source: std::io::Error| EvpackError::ListInputs {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        if !entry.file_type().map_err(list_err)?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        files.push(entry.path());
    }

    if sort {
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }
    Ok(files)
}
