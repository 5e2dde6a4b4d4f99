//! Archive expansion onto disk

use evpack_format::{EvpackError, Limits, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Expands an archive of compressed fragments into a directory
pub trait ArchiveExpander {
    /// Extract every member of `archive` under `target_dir`.
    ///
    /// Any failure is an [`EvpackError::Extraction`] and is fatal to the run.
    fn expand(&self, archive: &Path, target_dir: &Path) -> Result<ExpandSummary>;
}

/// What an expansion put on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandSummary {
    /// Regular files written
    pub files_extracted: usize,
    /// Directories created for archive directory entries
    pub directories_created: usize,
    /// Uncompressed bytes written
    pub bytes_extracted: u64,
}

/// Zip archive expander
#[derive(Debug, Clone, Default)]
pub struct ZipExpander {
    limits: Limits,
}

impl ZipExpander {
    /// Create an expander enforcing the supplied limits
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    fn expand_inner(&self, archive: &Path, target_dir: &Path) -> Result<ExpandSummary> {
        let fail = |source: Box<dyn std::error::Error + Send + Sync>| {
            EvpackError::extraction(archive, source)
        };

        let file = File::open(archive).map_err(|e| fail(e.into()))?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| fail(e.into()))?;

        if zip.len() > self.limits.max_archive_entries {
            return Err(fail(
                format!(
                    "{} members exceeds limit of {}",
                    zip.len(),
                    self.limits.max_archive_entries
                )
                .into(),
            ));
        }

        fs::create_dir_all(target_dir).map_err(|e| fail(e.into()))?;

        let mut summary = ExpandSummary::default();
        for idx in 0..zip.len() {
            let mut member = zip.by_index(idx).map_err(|e| fail(e.into()))?;
            let relative = member
                .enclosed_name()
                .ok_or_else(|| fail(format!("unsafe member path '{}'", member.name()).into()))?;
            let destination = target_dir.join(relative);

            if member.is_dir() {
                fs::create_dir_all(&destination).map_err(|e| fail(e.into()))?;
                summary.directories_created += 1;
                continue;
            }

            if member.size() > self.limits.max_archive_entry_bytes {
                return Err(fail(
                    format!(
                        "member '{}' declares {} bytes (limit: {})",
                        member.name(),
                        member.size(),
                        self.limits.max_archive_entry_bytes
                    )
                    .into(),
                ));
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| fail(e.into()))?;
            }

            let mut out = File::create(&destination).map_err(|e| fail(e.into()))?;
            let mut bounded = (&mut member).take(self.limits.max_archive_entry_bytes + 1);
            let written = io::copy(&mut bounded, &mut out).map_err(|e| fail(e.into()))?;
            if written > self.limits.max_archive_entry_bytes {
                return Err(fail(
                    format!(
                        "member '{}' inflates past {} bytes",
                        destination.display(),
                        self.limits.max_archive_entry_bytes
                    )
                    .into(),
                ));
            }

            debug!(member = %destination.display(), bytes = written, "extracted archive member");
            summary.files_extracted += 1;
            summary.bytes_extracted += written;
        }

        Ok(summary)
    }
}

impl ArchiveExpander for ZipExpander {
    fn expand(&self, archive: &Path, target_dir: &Path) -> Result<ExpandSummary> {
        let summary = self.expand_inner(archive, target_dir)?;
        info!(
            archive = %archive.display(),
            target = %target_dir.display(),
            files = summary.files_extracted,
            bytes = summary.bytes_extracted,
            "archive expanded"
        );
        Ok(summary)
    }
}
