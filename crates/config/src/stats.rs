//! Stats reporter section

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::duration::serde_duration;

/// `[stats]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    /// Snapshot destination (regular file or pre-created FIFO)
    pub path: PathBuf,

    /// Cadence between snapshots
    #[serde(with = "serde_duration")]
    pub flush_interval: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vigil-stats"),
            flush_interval: Duration::from_secs(10),
        }
    }
}
