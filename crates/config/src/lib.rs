//! Vigil Configuration
//!
//! TOML-based configuration loading with sensible defaults: a minimal file
//! only needs the endpoints that differ from stock behavior.
//!
//! # Example Minimal Config
//!
//! ```toml
//! [db]
//! path = "vigil.db"
//!
//! [[endpoints]]
//! name = "poller-in"
//! role = "input"
//! transport = "tcp-accept"
//! address = "0.0.0.0:5669"
//! ```
//!
//! # Parsing
//!
//! ```
//! use std::str::FromStr;
//! use vigil_config::Config;
//!
//! let config = Config::from_str("[db]\npath = \"vigil.db\"").unwrap();
//! assert_eq!(config.db.connections, 3);
//! ```

mod broker;
mod db;
mod duration;
mod endpoints;
mod error;
mod logging;
mod spool;
mod stats;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use broker::BrokerConfig;
pub use db::DbConfig;
pub use duration::serde_duration;
pub use endpoints::{EndpointDef, EndpointRole, TransportKind};
pub use error::{ConfigError, Result};
pub use logging::LogConfig;
pub use spool::SpoolConfig;
pub use stats::StatsConfig;

/// Main configuration structure
///
/// All sections are optional with defaults that work for a single-node
/// setup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Broker identity
    pub broker: BrokerConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// SQL persister knobs
    pub db: DbConfig,

    /// Stats reporter knobs
    pub stats: StatsConfig,

    /// On-disk queue knobs
    pub spool: SpoolConfig,

    /// Configured endpoints
    pub endpoints: Vec<EndpointDef>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Endpoint definition by name
    pub fn endpoint(&self, name: &str) -> Option<&EndpointDef> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Names of endpoints referenced as failovers by others
    pub fn failover_names(&self) -> Vec<&str> {
        self.endpoints
            .iter()
            .filter_map(|e| e.failover.as_deref())
            .collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod config_test;
