//! Resource limits guarding against decompression bombs

/// Limits applied while expanding archives and decompressing fragments
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum decompressed bytes read from one gzip fragment (default: 1 GiB)
    pub max_decompressed_bytes_per_file: u64,
    /// Maximum uncompressed size of one archive member (default: 1 GiB)
    pub max_archive_entry_bytes: u64,
    /// Maximum number of members extracted from one archive (default: 100,000)
    pub max_archive_entries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_decompressed_bytes_per_file: 1024 * 1024 * 1024,
            max_archive_entry_bytes: 1024 * 1024 * 1024,
            max_archive_entries: 100_000,
        }
    }
}
