//! Transport abstraction
//!
//! The worker consumes a plain byte stream; TLS and compression layers wrap
//! it elsewhere. [`StreamFactory::open`] yields one connected stream per
//! call: connectors dial out, acceptors bind lazily and hand back the next
//! inbound connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Byte stream consumed by a worker
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Owned transport trait object
pub type BoxedTransport = Box<dyn Transport>;

/// Boxed future returned by [`StreamFactory::open`]
pub type OpenFuture<'a> = Pin<Box<dyn Future<Output = io::Result<BoxedTransport>> + Send + 'a>>;

/// Whether a factory dials out or waits for peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Connect,
    Accept,
}

/// Produces one transport stream per call
pub trait StreamFactory: Send + Sync {
    /// Open the next stream; blocks until connected or accepted
    fn open(&self) -> OpenFuture<'_>;

    /// Connect-side or accept-side, drives the `listening` state in stats
    fn kind(&self) -> FactoryKind {
        FactoryKind::Connect
    }

    /// Peer description for logs and stats
    fn describe(&self) -> String;
}

impl<T: StreamFactory + ?Sized> StreamFactory for std::sync::Arc<T> {
    fn open(&self) -> OpenFuture<'_> {
        (**self).open()
    }

    fn kind(&self) -> FactoryKind {
        (**self).kind()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Socket-level options shared by connector and acceptor
#[derive(Debug, Clone)]
pub struct TcpOptions {
    pub connect_timeout: Duration,
    pub keepalive: bool,
    pub keepalive_interval: Duration,
    pub nodelay: bool,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keepalive: true,
            keepalive_interval: Duration::from_secs(30),
            nodelay: true,
        }
    }
}

fn configure_socket(stream: &TcpStream, opts: &TcpOptions) {
    if opts.nodelay
        && let Err(e) = stream.set_nodelay(true)
    {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY, continuing");
    }
    if opts.keepalive {
        let sock_ref = SockRef::from(stream);
        let keepalive = TcpKeepalive::new().with_time(opts.keepalive_interval);
        #[cfg(target_os = "linux")]
        let keepalive = keepalive.with_interval(opts.keepalive_interval);
        if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
            tracing::debug!(error = %e, "failed to set TCP keep-alive, continuing");
        }
    }
}

/// Dial-out factory
pub struct TcpConnector {
    address: String,
    opts: TcpOptions,
}

impl TcpConnector {
    /// Create a connector for `host:port`
    pub fn new(address: impl Into<String>, opts: TcpOptions) -> Self {
        Self {
            address: address.into(),
            opts,
        }
    }
}

impl StreamFactory for TcpConnector {
    fn open(&self) -> OpenFuture<'_> {
        Box::pin(async move {
            let stream = timeout(self.opts.connect_timeout, TcpStream::connect(&self.address))
                .await
                .map_err(|_| {
                    io::Error::new(io::ErrorKind::TimedOut, "connection timed out")
                })??;
            configure_socket(&stream, &self.opts);
            tracing::debug!(peer = %self.address, "connected");
            Ok(Box::new(stream) as BoxedTransport)
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

/// Accept-side factory; binds lazily, yields one peer per call
pub struct TcpAcceptor {
    address: String,
    opts: TcpOptions,
    listener: Mutex<Option<TcpListener>>,
}

impl TcpAcceptor {
    /// Create an acceptor bound to `host:port` on first use
    pub fn new(address: impl Into<String>, opts: TcpOptions) -> Self {
        Self {
            address: address.into(),
            opts,
            listener: Mutex::new(None),
        }
    }
}

impl StreamFactory for TcpAcceptor {
    fn open(&self) -> OpenFuture<'_> {
        Box::pin(async move {
            let mut guard = self.listener.lock().await;
            if guard.is_none() {
                let listener = TcpListener::bind(&self.address).await?;
                tracing::info!(address = %self.address, "listening");
                *guard = Some(listener);
            }
            let (stream, peer) = guard.as_ref().unwrap().accept().await?;
            configure_socket(&stream, &self.opts);
            tracing::debug!(peer = %peer, "peer accepted");
            Ok(Box::new(stream) as BoxedTransport)
        })
    }

    fn kind(&self) -> FactoryKind {
        FactoryKind::Accept
    }

    fn describe(&self) -> String {
        format!("tcp-accept://{}", self.address)
    }
}

/// In-memory factory handing out pre-queued duplex streams (tests)
pub struct DuplexFactory {
    streams: Mutex<Vec<BoxedTransport>>,
}

impl DuplexFactory {
    /// Queue the given streams; `open` pops from the front
    pub fn new(streams: Vec<BoxedTransport>) -> Self {
        Self {
            streams: Mutex::new(streams),
        }
    }

    /// A factory that always fails, for exercising retry paths
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Queue another stream for a later `open` call
    pub async fn push(&self, stream: BoxedTransport) {
        self.streams.lock().await.push(stream);
    }
}

impl StreamFactory for DuplexFactory {
    fn open(&self) -> OpenFuture<'_> {
        Box::pin(async move {
            let mut guard = self.streams.lock().await;
            if guard.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "no stream queued",
                ));
            }
            Ok(guard.remove(0))
        })
    }

    fn describe(&self) -> String {
        "duplex".into()
    }
}
