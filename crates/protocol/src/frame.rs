//! BBDO framing
//!
//! Every frame is a 16-byte header followed by up to 65535 payload bytes:
//!
//! ```text
//! [checksum:16][size:16][type:32][source:32][destination:32][payload:size]
//! ```
//!
//! Header fields are big-endian; the checksum is CRC-16/CCITT-FALSE over
//! the fourteen bytes that follow it. Payloads larger than the 16-bit size
//! field are split: every chunk but the last carries `size == 0xFFFF` and
//! the decoder reassembles consecutive frames of the same type id.
//!
//! A corrupted header is survivable: the decoder slides forward one byte at
//! a time until it finds the next checksum-consistent header. An assembled
//! payload above the configured cap is not, and fails the connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::registry::EventType;
use crate::Result;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 16;

/// Chunk marker: payload continues in the next frame
const CONTINUATION_SIZE: usize = 0xFFFF;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF)
fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub checksum: u16,
    pub size: u16,
    pub type_id: EventType,
    pub source_id: u32,
    pub destination_id: u32,
}

impl FrameHeader {
    /// Parse from exactly [`HEADER_SIZE`] bytes, verifying the checksum
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let received = u16::from_be_bytes([bytes[0], bytes[1]]);
        let computed = crc16_ccitt(&bytes[2..HEADER_SIZE]);
        if received != computed {
            return Err(CodecError::ChecksumMismatch { computed, received });
        }
        Ok(Self {
            checksum: received,
            size: u16::from_be_bytes([bytes[2], bytes[3]]),
            type_id: EventType(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])),
            source_id: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            destination_id: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }

    fn write(self, out: &mut BytesMut) {
        let mut rest = [0u8; HEADER_SIZE - 2];
        rest[0..2].copy_from_slice(&self.size.to_be_bytes());
        rest[2..6].copy_from_slice(&self.type_id.0.to_be_bytes());
        rest[6..10].copy_from_slice(&self.source_id.to_be_bytes());
        rest[10..14].copy_from_slice(&self.destination_id.to_be_bytes());
        out.put_u16(crc16_ccitt(&rest));
        out.put_slice(&rest);
    }
}

/// Frame a payload, splitting above the 16-bit size limit
///
/// The final chunk always carries `size < 0xFFFF`; an exact multiple of the
/// chunk size is followed by an empty terminator frame.
pub fn encode_frame(
    type_id: EventType,
    source_id: u32,
    destination_id: u32,
    payload: &[u8],
    out: &mut BytesMut,
) {
    let mut rest = payload;
    loop {
        let take = rest.len().min(CONTINUATION_SIZE);
        FrameHeader {
            checksum: 0,
            size: take as u16,
            type_id,
            source_id,
            destination_id,
        }
        .write(out);
        out.put_slice(&rest[..take]);
        rest = &rest[take..];
        if take < CONTINUATION_SIZE {
            break;
        }
        // take == 0xFFFF: more follows, possibly an empty terminator
        if rest.is_empty() {
            FrameHeader {
                checksum: 0,
                size: 0,
                type_id,
                source_id,
                destination_id,
            }
            .write(out);
            break;
        }
    }
}

/// Reassembled frame handed to the registry for payload decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub type_id: EventType,
    pub source_id: u32,
    pub destination_id: u32,
    pub payload: Bytes,
}

/// In-flight continuation chain
struct Partial {
    type_id: EventType,
    source_id: u32,
    destination_id: u32,
    payload: BytesMut,
}

/// Incremental frame decoder over a byte stream
///
/// Feed bytes with [`push`](Self::push), drain frames with
/// [`next_frame`](Self::next_frame). `Ok(None)` means more bytes are
/// needed; a [`CodecError::FrameTooLarge`] is fatal for the connection.
pub struct FrameDecoder {
    buf: BytesMut,
    partial: Option<Partial>,
    max_frame_size: usize,
    resyncs: u64,
}

impl FrameDecoder {
    /// Create a decoder with the given assembled-payload cap
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            partial: None,
            max_frame_size,
            resyncs: 0,
        }
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Number of single-byte skips performed while resynchronizing
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Decode the next complete frame, reassembling continuations
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        loop {
            if self.buf.len() < HEADER_SIZE {
                return Ok(None);
            }

            let mut header_bytes = [0u8; HEADER_SIZE];
            header_bytes.copy_from_slice(&self.buf[..HEADER_SIZE]);
            let header = match FrameHeader::parse(&header_bytes) {
                Ok(h) => h,
                Err(_) => {
                    // Slide one byte and scan for the next plausible header.
                    self.buf.advance(1);
                    self.resyncs += 1;
                    if self.resyncs % 1024 == 1 {
                        tracing::warn!(
                            resyncs = self.resyncs,
                            "header checksum mismatch, resynchronizing"
                        );
                    }
                    continue;
                }
            };

            let size = header.size as usize;
            let assembled = self.partial.as_ref().map_or(0, |p| p.payload.len());
            if assembled + size > self.max_frame_size {
                return Err(CodecError::FrameTooLarge {
                    size: assembled + size,
                    max: self.max_frame_size,
                });
            }

            if self.buf.len() < HEADER_SIZE + size {
                return Ok(None);
            }

            self.buf.advance(HEADER_SIZE);
            let chunk = self.buf.split_to(size);

            // A type change aborts an unfinished continuation chain.
            let interrupted = self
                .partial
                .as_ref()
                .is_some_and(|p| p.type_id != header.type_id);
            if interrupted && let Some(dropped) = self.partial.take() {
                tracing::warn!(
                    expected = %dropped.type_id,
                    got = %header.type_id,
                    dropped_bytes = dropped.payload.len(),
                    "continuation chain interrupted, dropping partial event"
                );
            }

            if size == CONTINUATION_SIZE {
                match self.partial.as_mut() {
                    Some(p) => p.payload.extend_from_slice(&chunk),
                    None => {
                        self.partial = Some(Partial {
                            type_id: header.type_id,
                            source_id: header.source_id,
                            destination_id: header.destination_id,
                            payload: BytesMut::from(&chunk[..]),
                        })
                    }
                }
                continue;
            }

            let frame = match self.partial.take() {
                Some(mut p) => {
                    p.payload.extend_from_slice(&chunk);
                    RawFrame {
                        type_id: p.type_id,
                        source_id: p.source_id,
                        destination_id: p.destination_id,
                        payload: p.payload.freeze(),
                    }
                }
                None => RawFrame {
                    type_id: header.type_id,
                    source_id: header.source_id,
                    destination_id: header.destination_id,
                    payload: chunk.freeze(),
                },
            };
            return Ok(Some(frame));
        }
    }
}
