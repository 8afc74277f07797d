//! Spool error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the on-disk queue
#[derive(Debug, Error)]
pub enum SpoolError {
    /// File could not be created or opened
    #[error("failed to open spool file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Append failed (ENOSPC surfaces here)
    #[error("failed to append to spool file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Consume failed
    #[error("failed to read spool file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory scan failed during recovery
    #[error("failed to scan spool directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Seek target does not exist
    #[error("seek target file {id} is outside [{first}, {last}]")]
    SeekOutOfRange { id: u64, first: u64, last: u64 },
}
