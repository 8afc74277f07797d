//! Vigil Protocol - Event model and BBDO wire codec
//!
//! This crate provides the types that flow through every pipe of the broker:
//! - `Event` - routed unit of work (type id + source/destination + payload)
//! - `Payload` - one enum over every monitoring fact the broker understands
//! - `Registry` - process-scoped read-only table binding type ids to codecs
//! - `FrameDecoder` / `encode_frame` - self-describing length-prefixed framing
//!
//! # Design Principles
//!
//! - **One payload, two codecs**: legacy flat-field events and protobuf
//!   events decode into the same structs, so downstream handlers never
//!   duplicate per-representation logic.
//! - **Zero codegen**: the protobuf wire format is parsed by hand, field by
//!   field; unknown fields are skipped for forward compatibility.
//! - **Unknown type ids are survivable**: a frame whose type id is not
//!   registered is skipped with a warning, never a connection teardown.
//!
//! # Wire Format
//!
//! ```text
//! [checksum:16][size:16][type:32][source:32][destination:32][payload:size]
//! ```
//!
//! All header fields are big-endian. The checksum is CRC-16/CCITT-FALSE over
//! the fourteen header bytes that follow it.

mod error;
mod events;
mod frame;
mod legacy;
mod proto;
mod registry;

pub use error::CodecError;
pub use events::{
    Acknowledgement, AckFrame, AdaptiveHost, AdaptiveService, Comment, CustomVariable,
    CustomVariableStatus, Downtime, Host, HostCheck, HostDependency, HostGroup, HostGroupMember,
    HostParent, HostStatus, IndexMapping, Instance, InstanceStatus, LogEntry, Metric,
    MetricMapping, Module, Payload, PerfStatus, Rebuild, RefAction, RemoveGraph, Service,
    ServiceCheck, ServiceDependency, ServiceGroup, ServiceGroupMember, ServiceStatus, Severity,
    Tag, TagRef, TagKind, VersionResponse,
};
pub use frame::{FrameDecoder, FrameHeader, RawFrame, encode_frame, HEADER_SIZE};
pub use registry::{Category, Codec, Event, EventInfo, EventType, Registry, types};

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Default maximum frame size (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Protocol version spoken by this build
pub const VERSION_MAJOR: u16 = 2;
/// Minor protocol version
pub const VERSION_MINOR: u16 = 3;
/// Patch protocol version
pub const VERSION_PATCH: u16 = 0;

// Test modules - only compiled during testing
#[cfg(test)]
mod frame_test;
#[cfg(test)]
mod codec_test;
#[cfg(test)]
mod registry_test;
