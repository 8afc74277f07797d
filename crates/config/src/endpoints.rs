//! Endpoint definitions

use std::time::Duration;

use serde::Deserialize;

use crate::duration::serde_duration;

/// Which side of the pipeline an endpoint feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// Receives events from pollers or upstream brokers
    Input,
    /// Forwards events to downstream consumers (RRD writer, other brokers)
    Output,
}

/// Transport flavor behind an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Dial out to `address`
    Tcp,
    /// Bind `address` and accept peers
    TcpAccept,
}

/// One `[[endpoints]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointDef {
    /// Unique endpoint name; also keys its queue files
    pub name: String,

    /// Input or output side
    pub role: EndpointRole,

    /// Transport flavor
    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    /// `host:port` to dial or bind
    pub address: String,

    /// Sleep between reconnection attempts
    #[serde(default = "default_retry_interval", with = "serde_duration")]
    pub retry_interval: Duration,

    /// Grace period before the failover takes over
    #[serde(default = "default_buffering_timeout", with = "serde_duration")]
    pub buffering_timeout: Duration,

    /// Consumed events between acknowledgement frames
    #[serde(default = "default_ack_interval")]
    pub ack_interval: u32,

    /// Assembled-frame size cap in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Event categories this endpoint carries (`neb`, `storage`, `bbdo`);
    /// empty means all
    #[serde(default)]
    pub categories: Vec<String>,

    /// Name of the endpoint acting as failover while this one is down
    #[serde(default)]
    pub failover: Option<String>,

    /// Fallback addresses tried, in order, when the primary fails to open
    #[serde(default)]
    pub secondaries: Vec<String>,
}

fn default_transport() -> TransportKind {
    TransportKind::Tcp
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_buffering_timeout() -> Duration {
    Duration::ZERO
}

fn default_ack_interval() -> u32 {
    1000
}

fn default_max_frame_size() -> usize {
    16 * 1024 * 1024
}
