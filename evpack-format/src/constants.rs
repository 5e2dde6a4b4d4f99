//! Constants and fixed locations for evpack runs

/// Byte budget for one output batch, measured in raw chunk bytes.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 8192;

/// Archive holding the compressed event-log fragments.
pub const DEFAULT_ARCHIVE_PATH: &str = "files/input.zip";

/// Directory the archive is expanded into.
pub const DEFAULT_EXTRACT_DIR: &str = "files/decompressed";

/// Directory holding the gzip fragments once the archive is expanded.
pub const DEFAULT_INPUT_DIR: &str = "files/decompressed/input";

/// Directory receiving the numbered output batches.
pub const DEFAULT_OUTPUT_DIR: &str = "files/transformed";

/// Extension of sealed output batches (`0.json`, `1.json`, ...).
pub const OUTPUT_EXTENSION: &str = "json";
