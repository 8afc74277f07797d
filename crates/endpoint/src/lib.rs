//! Vigil Endpoint - I/O workers
//!
//! One worker drives each configured peer: it owns a transport stream
//! produced by its [`StreamFactory`], speaks BBDO over it through a
//! [`BbdoLink`] (version negotiation first, then framed events with
//! acknowledgement accounting), and runs the reconnect/failover state
//! machine described by [`EndpointState`].
//!
//! Workers consume from their exclusively-owned muxer and publish inbound
//! events to the engine. A failover is a full child worker with its own
//! muxer; while the primary is down the child buffers (or forwards) the
//! stream, and on reconnect the primary drains the child before resuming
//! normal consumption.

mod error;
mod link;
mod transport;
mod worker;

pub use error::EndpointError;
pub use link::{BbdoLink, LinkConfig, LinkReader, LinkWriter, PeerInfo};
pub use transport::{
    BoxedTransport, DuplexFactory, FactoryKind, StreamFactory, TcpAcceptor, TcpConnector,
    TcpOptions,
};
pub use worker::{Endpoint, EndpointConfig, EndpointState, EndpointStatus};

/// Result type for endpoint operations
pub type Result<T> = std::result::Result<T, EndpointError>;

/// Poll interval bounding stop latency on blocking reads
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

#[cfg(test)]
mod link_test;
#[cfg(test)]
mod worker_test;
