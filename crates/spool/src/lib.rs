//! Vigil Spool - on-disk overflow queue
//!
//! A [`Splitter`] presents one logical append-only byte sequence physically
//! stored across numbered, size-capped files. A write cursor appends at the
//! tail while an independent read cursor consumes from the head; files the
//! reader has fully drained are unlinked once a newer file exists.
//!
//! The queue survives restarts: a `.stats` sidecar records both cursors, and
//! when it is missing or stale the state is reconstructed from the files
//! present on disk (lowest number is the read head).

mod error;
mod splitter;

pub use error::SpoolError;
pub use splitter::{Splitter, SplitterOptions};

/// Result type for spool operations
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Default per-file size cap (100 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100_000_000;

#[cfg(test)]
mod splitter_test;
