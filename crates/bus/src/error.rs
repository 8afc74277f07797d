//! Bus error types

use thiserror::Error;

/// Errors raised by the multiplexing fabric
#[derive(Debug, Error)]
pub enum BusError {
    /// Disk overflow queue failed
    #[error("spool failure on muxer {muxer}: {source}")]
    Spool {
        muxer: String,
        #[source]
        source: vigil_spool::SpoolError,
    },

    /// Event could not be serialized for spilling
    #[error("codec failure on muxer {muxer}: {source}")]
    Codec {
        muxer: String,
        #[source]
        source: vigil_protocol::CodecError,
    },

    /// A muxer with this name is already registered
    #[error("muxer {0} is already registered")]
    DuplicateMuxer(String),

    /// Publish after shutdown
    #[error("engine is stopped")]
    Stopped,
}
