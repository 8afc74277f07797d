//! Persister error types

use thiserror::Error;

/// Errors raised by the SQL persister
#[derive(Debug, Error)]
pub enum PersistError {
    /// Database-level failure
    #[error("database error: {0}")]
    Db(#[from] turso::Error),

    /// An insert produced no surrogate id and the fallback SELECT found
    /// nothing either
    #[error("no id for {entity} {key}")]
    MissingId { entity: &'static str, key: String },

    /// Connection worker is gone (shutdown in progress)
    #[error("connection {0} is closed")]
    ConnectionClosed(usize),

    /// Bus refused a derived-event publish
    #[error(transparent)]
    Bus(#[from] vigil_bus::BusError),
}
