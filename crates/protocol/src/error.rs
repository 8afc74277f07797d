//! Codec error types

use thiserror::Error;

/// Errors raised while framing, encoding or decoding events
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload ended before all registered fields were read
    #[error("payload too short: needed {needed} more bytes for {field}")]
    Truncated { field: &'static str, needed: usize },

    /// Header checksum did not match the received bytes
    #[error("header checksum mismatch: computed {computed:#06x}, frame carries {received:#06x}")]
    ChecksumMismatch { computed: u16, received: u16 },

    /// Frame larger than the configured cap; the connection must be dropped
    #[error("frame of {size} bytes exceeds the {max} byte cap")]
    FrameTooLarge { size: usize, max: usize },

    /// Type id absent from the registry (forward compatibility: skip, count)
    #[error("unknown event type {0:#010x}")]
    UnknownType(u32),

    /// String field holds invalid UTF-8
    #[error("invalid UTF-8 in field {0}")]
    InvalidUtf8(&'static str),

    /// String field is missing its NUL terminator
    #[error("unterminated string in field {0}")]
    UnterminatedString(&'static str),

    /// Protobuf wire type does not fit the field
    #[error("unexpected wire type {wire_type} for field {field_number}")]
    WireType { field_number: u32, wire_type: u8 },

    /// Varint longer than ten bytes
    #[error("malformed varint")]
    Varint,

    /// Payload kind cannot be expressed by the requested codec family
    #[error("{kind} has no {codec} representation")]
    Unrepresentable {
        kind: &'static str,
        codec: &'static str,
    },
}

impl CodecError {
    /// Whether the connection can survive this error
    ///
    /// Checksum mismatches and unknown types are skip-and-continue; an
    /// oversized frame is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::FrameTooLarge { .. })
    }
}
