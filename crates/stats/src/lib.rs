//! Vigil Stats - component state snapshots
//!
//! Every component worth watching exposes a [`StatsProvider`]; the
//! [`Reporter`] collects all of them on a fixed cadence and writes a
//! human-readable `key=value` snapshot to a well-known path.
//!
//! The path is typically a named pipe pre-created by the operator: the
//! reporter opens it non-blocking, skips the snapshot when nobody is
//! reading, and closes it again between snapshots so consumers can simply
//! tail the file without ever applying backpressure to the broker.

mod reporter;
mod section;

pub use reporter::{Reporter, ReporterBuilder, ReporterConfig};
pub use section::StatsSection;

use std::sync::Arc;

/// A component that can be snapshotted
pub trait StatsProvider: Send + Sync {
    /// Current state as a named section of `key=value` entries
    fn stats_section(&self) -> StatsSection;
}

/// Convenience alias used by the reporter builder
pub type SharedProvider = Arc<dyn StatsProvider>;

#[cfg(test)]
mod reporter_test;
