//! SQL persister section

use serde::Deserialize;

/// `[db]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    /// Database file path
    pub path: String,

    /// Number of logical connections, each with its own worker
    pub connections: usize,

    /// Statements per explicit transaction before a commit
    pub queries_per_transaction: usize,

    /// Seconds without status before an instance is marked outdated;
    /// zero disables the sweep
    pub instance_timeout: u64,

    /// Write the legacy per-object `hosts`/`services` tables
    pub store_in_hosts_services: bool,

    /// Mirror state into the unified `resources` table
    pub store_in_resources: bool,

    /// Persist raw perfdata rows into `data_bin`
    pub store_in_data_bin: bool,

    /// Default RRD retention (seconds) assigned to new indexes
    pub rrd_len: i32,

    /// Seconds per check-interval unit
    pub interval_length: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: "vigil.db".into(),
            connections: 3,
            queries_per_transaction: 2000,
            instance_timeout: 300,
            store_in_hosts_services: true,
            store_in_resources: true,
            store_in_data_bin: true,
            rrd_len: 15_552_000,
            interval_length: 60,
        }
    }
}
