//! Configuration error types

use thiserror::Error;

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two endpoints share a name
    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),

    /// A failover reference points nowhere
    #[error("endpoint {endpoint} names unknown failover {failover}")]
    UnknownFailover { endpoint: String, failover: String },

    /// Failover chain loops back on itself
    #[error("failover chain starting at {0} is cyclic")]
    FailoverCycle(String),

    /// Out-of-range numeric value
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
