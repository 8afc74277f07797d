//! Endpoint error types

use thiserror::Error;

/// Errors raised by endpoint workers and their links
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Transport-level failure; the worker re-enters its reconnect loop
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection attempt exceeded its deadline
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    /// Frame or payload codec failure
    #[error("codec error: {0}")]
    Codec(#[from] vigil_protocol::CodecError),

    /// Peer speaks an incompatible protocol major; terminal, no retry
    #[error("bbdo major mismatch: local {local}, peer {peer}")]
    PeerIncompatible { local: u16, peer: u16 },

    /// First frame of the connection was not a version_response
    #[error("peer opened with {got} instead of version_response")]
    NegotiationProtocol { got: String },

    /// Peer went silent past the idle deadline
    #[error("peer idle for more than {0:?}")]
    IdleTimeout(std::time::Duration),

    /// Header corruption persisted past the resync limit
    #[error("{0} resynchronizations exceeded the corruption threshold")]
    TooManyResyncs(u64),

    /// Bus refused the publish (shutdown in progress)
    #[error(transparent)]
    Bus(#[from] vigil_bus::BusError),
}

impl EndpointError {
    /// True when the worker may retry; false pins it to `Disconnected`
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PeerIncompatible { .. })
    }
}
