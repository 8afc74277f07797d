//! Vigil Bus - multiplexing fabric
//!
//! The [`Engine`] fans every published event out to the set of registered
//! [`Muxer`]s over a copy-on-write snapshot, so publishers never block on
//! subscription changes. Each muxer owns a per-subscriber queue: a bounded
//! in-memory deque backed by a disk [`Splitter`](vigil_spool::Splitter) for
//! overflow, with strict FIFO ordering, acknowledgement accounting and
//! crash-safe persistence of unconsumed events.
//!
//! Ordering: per muxer, strict publish order. Across muxers, none.

mod engine;
mod error;
mod muxer;

pub use engine::{Engine, EngineStats};
pub use error::BusError;
pub use muxer::{Muxer, MuxerOptions, MuxerStats, ReadOutcome};

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Default soft cap on in-memory events per muxer
pub const DEFAULT_QUEUE_CAP: usize = 10_000;

#[cfg(test)]
mod engine_test;
#[cfg(test)]
mod muxer_test;
