//! On-disk queue section

use std::path::PathBuf;

use serde::Deserialize;

/// `[spool]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpoolConfig {
    /// Directory holding every muxer's queue files
    pub directory: PathBuf,

    /// Per-file size cap in bytes
    pub max_file_size: u64,

    /// Unlink fully-consumed queue files
    pub auto_delete: bool,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("spool"),
            max_file_size: 100_000_000,
            auto_delete: true,
        }
    }
}
