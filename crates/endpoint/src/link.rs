//! BBDO link over a transport
//!
//! Glue between a byte stream and the event world: frames outbound events,
//! reassembles and decodes inbound ones, performs the version handshake and
//! keeps the consumed-events counter that drives acknowledgement frames.
//!
//! The handshake comes first on every connection: each side sends a
//! `version_response`, majors must match, the effective minor is the lower
//! of the two. After negotiation the link splits into independent read and
//! write halves so a worker can pump both directions from one select loop.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};

use vigil_protocol::{
    encode_frame, types, AckFrame, Event, FrameDecoder, Payload, Registry, VersionResponse,
};

use crate::error::EndpointError;
use crate::transport::BoxedTransport;
use crate::Result;

/// Header resyncs tolerated before the connection is declared corrupt
const RESYNC_LIMIT: u64 = 4096;

/// Link tuning knobs
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Assembled-frame cap; larger inbound frames fail the connection
    pub max_frame_size: usize,
    /// Consumed events between acknowledgement frames
    pub ack_interval: u32,
    /// Peer silence tolerated before the connection is failed
    pub idle_timeout: Duration,
    /// Extension names offered during negotiation
    pub extensions: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_frame_size: vigil_protocol::DEFAULT_MAX_FRAME_SIZE,
            ack_interval: 1000,
            idle_timeout: Duration::from_secs(30),
            extensions: String::new(),
        }
    }
}

/// Negotiated peer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

/// A fresh, not-yet-negotiated BBDO connection
pub struct BbdoLink {
    transport: BoxedTransport,
    registry: Arc<Registry>,
    config: LinkConfig,
    decoder: FrameDecoder,
}

impl BbdoLink {
    /// Wrap a connected transport
    pub fn new(transport: BoxedTransport, registry: Arc<Registry>, config: LinkConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config.max_frame_size),
            transport,
            registry,
            config,
        }
    }

    /// Exchange `version_response` frames; majors must match
    ///
    /// The effective minor version is the lower of the two sides. A major
    /// mismatch is terminal: the caller must not retry until reconfigured.
    pub async fn negotiate(&mut self) -> Result<PeerInfo> {
        let local = VersionResponse {
            major: vigil_protocol::VERSION_MAJOR,
            minor: vigil_protocol::VERSION_MINOR,
            patch: vigil_protocol::VERSION_PATCH,
            extensions: self.config.extensions.clone(),
        };
        let hello = Event::new(types::VERSION_RESPONSE, Payload::VersionResponse(local));
        let payload = hello.encode_payload(&self.registry)?;
        let mut frame = BytesMut::with_capacity(payload.len() + 32);
        encode_frame(hello.type_id, 0, 0, &payload, &mut frame);
        self.transport.write_all(&frame).await?;
        self.transport.flush().await?;

        // First inbound frame must be the peer's version_response.
        let deadline = tokio::time::Instant::now() + self.config.idle_timeout;
        loop {
            if let Some(raw) = self.decoder.next_frame()? {
                let Some(info) = self.registry.get(raw.type_id) else {
                    return Err(EndpointError::NegotiationProtocol {
                        got: raw.type_id.to_string(),
                    });
                };
                let Payload::VersionResponse(peer) = info.decode(&raw.payload)? else {
                    return Err(EndpointError::NegotiationProtocol {
                        got: info.name.to_string(),
                    });
                };
                if peer.major != vigil_protocol::VERSION_MAJOR {
                    return Err(EndpointError::PeerIncompatible {
                        local: vigil_protocol::VERSION_MAJOR,
                        peer: peer.major,
                    });
                }
                let effective = PeerInfo {
                    major: peer.major,
                    minor: peer.minor.min(vigil_protocol::VERSION_MINOR),
                    patch: peer.patch,
                };
                tracing::debug!(
                    major = effective.major,
                    minor = effective.minor,
                    extensions = %peer.extensions,
                    "bbdo negotiation complete"
                );
                return Ok(effective);
            }

            let mut chunk = [0u8; 4096];
            let n = tokio::time::timeout_at(deadline, self.transport.read(&mut chunk))
                .await
                .map_err(|_| EndpointError::IdleTimeout(self.config.idle_timeout))??;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            self.decoder.push(&chunk[..n]);
        }
    }

    /// Split into independently-driven halves
    pub fn split(self) -> (LinkReader, LinkWriter) {
        let (read_half, write_half) = tokio::io::split(self.transport);
        (
            LinkReader {
                transport: read_half,
                decoder: self.decoder,
                registry: Arc::clone(&self.registry),
                idle_timeout: self.config.idle_timeout,
                last_activity: tokio::time::Instant::now(),
                consumed: 0,
                unknown_types: 0,
            },
            LinkWriter {
                transport: write_half,
                registry: self.registry,
                buf: BytesMut::with_capacity(8 * 1024),
            },
        )
    }
}

/// Inbound half: reassembles frames and decodes events
pub struct LinkReader {
    transport: ReadHalf<BoxedTransport>,
    decoder: FrameDecoder,
    registry: Arc<Registry>,
    idle_timeout: Duration,
    last_activity: tokio::time::Instant,
    /// Events consumed since the last acknowledgement was sent
    consumed: u32,
    unknown_types: u64,
}

impl LinkReader {
    /// Next decoded event, or `None` after `poll` of quiet socket
    ///
    /// Unknown type ids and undecodable payloads are skipped with a counter
    /// bump; only transport failures, oversized frames and a blown resync
    /// limit surface as errors.
    pub async fn read_event(&mut self, poll: Duration) -> Result<Option<Event>> {
        let deadline = tokio::time::Instant::now() + poll;
        loop {
            while let Some(raw) = self.decoder.next_frame()? {
                if self.decoder.resync_count() > RESYNC_LIMIT {
                    return Err(EndpointError::TooManyResyncs(self.decoder.resync_count()));
                }
                let Some(info) = self.registry.get(raw.type_id) else {
                    self.unknown_types += 1;
                    tracing::warn!(type_id = %raw.type_id, "unknown event type, frame skipped");
                    continue;
                };
                match info.decode(&raw.payload) {
                    Ok(payload) => {
                        return Ok(Some(Event {
                            type_id: raw.type_id,
                            source_id: raw.source_id,
                            destination_id: raw.destination_id,
                            payload,
                        }));
                    }
                    Err(e) => {
                        self.unknown_types += 1;
                        tracing::warn!(
                            type_id = %raw.type_id,
                            error = %e,
                            "undecodable payload, frame skipped"
                        );
                    }
                }
            }

            let mut chunk = [0u8; 16 * 1024];
            let read = tokio::time::timeout_at(deadline, self.transport.read(&mut chunk)).await;
            match read {
                Ok(Ok(0)) => {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
                Ok(Ok(n)) => {
                    self.last_activity = tokio::time::Instant::now();
                    self.decoder.push(&chunk[..n]);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    // A half-received frame must not wait forever for its
                    // remainder.
                    if self.decoder.pending_bytes() > 0
                        && self.last_activity.elapsed() > self.idle_timeout
                    {
                        return Err(EndpointError::IdleTimeout(self.idle_timeout));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Count one consumed (published) event
    pub fn note_consumed(&mut self) -> u32 {
        self.consumed += 1;
        self.consumed
    }

    /// Take the consumed counter for an outgoing acknowledgement
    pub fn take_consumed(&mut self) -> u32 {
        std::mem::take(&mut self.consumed)
    }

    /// Frames skipped because of unknown or undecodable types
    pub fn unknown_type_count(&self) -> u64 {
        self.unknown_types
    }
}

/// Outbound half: frames and writes events
pub struct LinkWriter {
    transport: WriteHalf<BoxedTransport>,
    registry: Arc<Registry>,
    buf: BytesMut,
}

impl LinkWriter {
    /// Frame one event and flush it to the peer
    pub async fn write_event(&mut self, event: &Event) -> Result<()> {
        let payload = event.encode_payload(&self.registry)?;
        self.buf.clear();
        encode_frame(
            event.type_id,
            event.source_id,
            event.destination_id,
            &payload,
            &mut self.buf,
        );
        self.transport.write_all(&self.buf).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Write pre-framed bytes as-is
    pub async fn write_raw(&mut self, frame: &[u8]) -> Result<()> {
        self.transport.write_all(frame).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Acknowledge `count` consumed events (no-op for zero)
    pub async fn send_ack(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let ack = Event::new(
            types::ACK,
            Payload::Ack(AckFrame {
                acknowledged_events: count,
            }),
        );
        self.write_event(&ack).await
    }
}
