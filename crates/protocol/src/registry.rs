//! Event type registry
//!
//! Maps every 32-bit type id to its name, codec family and decoder. The
//! table is built once at startup ([`Registry::bootstrap`]) and read-only
//! afterwards; components hold it behind an `Arc`.
//!
//! Type ids are partitioned `category << 16 | element`. Legacy and protobuf
//! representations of the same fact have distinct elements but decode into
//! the same [`Payload`] variant.

use std::collections::HashMap;
use std::fmt;

use crate::error::CodecError;
use crate::events::Payload;
use crate::{legacy, proto, Result};

/// High 16 bits of a type id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Category {
    /// Monitoring facts emitted by pollers
    Neb = 1,
    /// Protocol control frames
    Bbdo = 2,
    /// Perfdata pipeline events consumed by the RRD writer
    Storage = 3,
}

impl Category {
    /// Parse from the high half of a type id
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Neb),
            2 => Some(Self::Bbdo),
            3 => Some(Self::Storage),
            _ => None,
        }
    }

    /// String name for logs and stats output
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neb => "neb",
            Self::Bbdo => "bbdo",
            Self::Storage => "storage",
        }
    }
}

/// A 32-bit event type id, `category << 16 | element`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(pub u32);

impl EventType {
    /// Build from category and element
    pub const fn new(category: Category, element: u16) -> Self {
        Self(((category as u32) << 16) | element as u32)
    }

    const fn neb(element: u16) -> Self {
        Self::new(Category::Neb, element)
    }

    const fn bbdo(element: u16) -> Self {
        Self::new(Category::Bbdo, element)
    }

    const fn storage(element: u16) -> Self {
        Self::new(Category::Storage, element)
    }

    /// Category half, if known
    pub const fn category(self) -> Option<Category> {
        Category::from_u16((self.0 >> 16) as u16)
    }

    /// Element half
    pub const fn element(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category() {
            Some(c) => write!(f, "{}:{}", c.as_str(), self.element()),
            None => write!(f, "unknown:0x{:08x}", self.0),
        }
    }
}

/// Well-known type ids
pub mod types {
    use super::EventType;

    // neb, legacy representation
    pub const ACKNOWLEDGEMENT: EventType = EventType::neb(1);
    pub const COMMENT: EventType = EventType::neb(2);
    pub const CUSTOM_VARIABLE: EventType = EventType::neb(3);
    pub const CUSTOM_VARIABLE_STATUS: EventType = EventType::neb(4);
    pub const DOWNTIME: EventType = EventType::neb(5);
    pub const HOST_CHECK: EventType = EventType::neb(8);
    pub const HOST_DEPENDENCY: EventType = EventType::neb(9);
    pub const HOST_GROUP: EventType = EventType::neb(10);
    pub const HOST_GROUP_MEMBER: EventType = EventType::neb(11);
    pub const HOST: EventType = EventType::neb(12);
    pub const HOST_PARENT: EventType = EventType::neb(13);
    pub const HOST_STATUS: EventType = EventType::neb(14);
    pub const INSTANCE: EventType = EventType::neb(15);
    pub const INSTANCE_STATUS: EventType = EventType::neb(16);
    pub const LOG_ENTRY: EventType = EventType::neb(17);
    pub const MODULE: EventType = EventType::neb(18);
    pub const SERVICE_CHECK: EventType = EventType::neb(19);
    pub const SERVICE_DEPENDENCY: EventType = EventType::neb(20);
    pub const SERVICE_GROUP: EventType = EventType::neb(21);
    pub const SERVICE_GROUP_MEMBER: EventType = EventType::neb(22);
    pub const SERVICE: EventType = EventType::neb(23);
    pub const SERVICE_STATUS: EventType = EventType::neb(24);

    // neb, protobuf representation
    pub const PB_SERVICE: EventType = EventType::neb(27);
    pub const PB_ADAPTIVE_SERVICE: EventType = EventType::neb(28);
    pub const PB_SERVICE_STATUS: EventType = EventType::neb(29);
    pub const PB_HOST: EventType = EventType::neb(30);
    pub const PB_ADAPTIVE_HOST: EventType = EventType::neb(31);
    pub const PB_HOST_STATUS: EventType = EventType::neb(32);
    pub const PB_SEVERITY: EventType = EventType::neb(33);
    pub const PB_TAG: EventType = EventType::neb(34);
    pub const PB_COMMENT: EventType = EventType::neb(35);
    pub const PB_DOWNTIME: EventType = EventType::neb(36);
    pub const PB_CUSTOM_VARIABLE: EventType = EventType::neb(37);
    pub const PB_CUSTOM_VARIABLE_STATUS: EventType = EventType::neb(38);
    pub const PB_HOST_CHECK: EventType = EventType::neb(39);
    pub const PB_SERVICE_CHECK: EventType = EventType::neb(40);
    pub const PB_LOG_ENTRY: EventType = EventType::neb(41);
    pub const PB_INSTANCE_STATUS: EventType = EventType::neb(42);
    pub const PB_MODULE: EventType = EventType::neb(43);
    pub const PB_INSTANCE: EventType = EventType::neb(44);
    pub const PB_ACKNOWLEDGEMENT: EventType = EventType::neb(45);
    pub const PB_HOST_DEPENDENCY: EventType = EventType::neb(46);
    pub const PB_SERVICE_DEPENDENCY: EventType = EventType::neb(47);
    pub const PB_HOST_GROUP: EventType = EventType::neb(48);
    pub const PB_HOST_GROUP_MEMBER: EventType = EventType::neb(49);
    pub const PB_SERVICE_GROUP: EventType = EventType::neb(50);
    pub const PB_SERVICE_GROUP_MEMBER: EventType = EventType::neb(51);
    pub const PB_HOST_PARENT: EventType = EventType::neb(52);

    // bbdo control frames
    pub const VERSION_RESPONSE: EventType = EventType::bbdo(1);
    pub const ACK: EventType = EventType::bbdo(2);

    // storage, legacy representation
    pub const METRIC: EventType = EventType::storage(1);
    pub const REBUILD: EventType = EventType::storage(2);
    pub const REMOVE_GRAPH: EventType = EventType::storage(3);
    pub const STATUS: EventType = EventType::storage(4);
    pub const INDEX_MAPPING: EventType = EventType::storage(5);
    pub const METRIC_MAPPING: EventType = EventType::storage(6);

    // storage, protobuf representation
    pub const PB_METRIC: EventType = EventType::storage(7);
    pub const PB_REBUILD: EventType = EventType::storage(8);
    pub const PB_REMOVE_GRAPH: EventType = EventType::storage(9);
    pub const PB_STATUS: EventType = EventType::storage(10);
    pub const PB_INDEX_MAPPING: EventType = EventType::storage(11);
    pub const PB_METRIC_MAPPING: EventType = EventType::storage(12);
}

/// Codec family of a registered type id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Fixed-width big-endian fields in registry order
    Legacy,
    /// Hand-written protobuf wire format
    Proto,
}

/// Registry entry for one type id
pub struct EventInfo {
    /// Stable event name (`"host_status"`, ...)
    pub name: &'static str,
    /// Wire representation of this id
    pub codec: Codec,
    /// Primary table this event lands in, if any (stats / diagnostics)
    pub table: Option<&'static str>,
    decode: fn(&[u8]) -> Result<Payload>,
}

impl EventInfo {
    /// Decode a payload of this type
    pub fn decode(&self, payload: &[u8]) -> Result<Payload> {
        (self.decode)(payload)
    }
}

impl fmt::Debug for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventInfo")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .finish()
    }
}

/// Process-scoped, read-only type table
///
/// Built once at startup; lookup is O(1). An id missing from the table is a
/// forward-compatibility event, not an error: callers skip the frame and
/// count it.
pub struct Registry {
    entries: HashMap<u32, EventInfo>,
}

macro_rules! entry {
    ($map:ident, $id:expr, $name:literal, $codec:expr, $table:expr, $decode:path) => {
        $map.insert(
            $id.0,
            EventInfo {
                name: $name,
                codec: $codec,
                table: $table,
                decode: $decode,
            },
        );
    };
}

impl Registry {
    /// Build the full type table
    pub fn bootstrap() -> Self {
        use types::*;
        let mut m = HashMap::new();

        // neb, legacy
        entry!(m, ACKNOWLEDGEMENT, "acknowledgement", Codec::Legacy, Some("acknowledgements"), legacy::decode_acknowledgement);
        entry!(m, COMMENT, "comment", Codec::Legacy, Some("comments"), legacy::decode_comment);
        entry!(m, CUSTOM_VARIABLE, "custom_variable", Codec::Legacy, Some("customvariables"), legacy::decode_custom_variable);
        entry!(m, CUSTOM_VARIABLE_STATUS, "custom_variable_status", Codec::Legacy, Some("customvariables"), legacy::decode_custom_variable_status);
        entry!(m, DOWNTIME, "downtime", Codec::Legacy, Some("downtimes"), legacy::decode_downtime);
        entry!(m, HOST_CHECK, "host_check", Codec::Legacy, Some("hosts"), legacy::decode_host_check);
        entry!(m, HOST_DEPENDENCY, "host_dependency", Codec::Legacy, Some("hosts_hosts_dependencies"), legacy::decode_host_dependency);
        entry!(m, HOST_GROUP, "host_group", Codec::Legacy, Some("hostgroups"), legacy::decode_host_group);
        entry!(m, HOST_GROUP_MEMBER, "host_group_member", Codec::Legacy, Some("hosts_hostgroups"), legacy::decode_host_group_member);
        entry!(m, HOST, "host", Codec::Legacy, Some("hosts"), legacy::decode_host);
        entry!(m, HOST_PARENT, "host_parent", Codec::Legacy, Some("hosts_hosts_parents"), legacy::decode_host_parent);
        entry!(m, HOST_STATUS, "host_status", Codec::Legacy, Some("hosts"), legacy::decode_host_status);
        entry!(m, INSTANCE, "instance", Codec::Legacy, Some("instances"), legacy::decode_instance);
        entry!(m, INSTANCE_STATUS, "instance_status", Codec::Legacy, Some("instances"), legacy::decode_instance_status);
        entry!(m, LOG_ENTRY, "log_entry", Codec::Legacy, Some("logs"), legacy::decode_log_entry);
        entry!(m, MODULE, "module", Codec::Legacy, Some("modules"), legacy::decode_module);
        entry!(m, SERVICE_CHECK, "service_check", Codec::Legacy, Some("services"), legacy::decode_service_check);
        entry!(m, SERVICE_DEPENDENCY, "service_dependency", Codec::Legacy, Some("services_services_dependencies"), legacy::decode_service_dependency);
        entry!(m, SERVICE_GROUP, "service_group", Codec::Legacy, Some("servicegroups"), legacy::decode_service_group);
        entry!(m, SERVICE_GROUP_MEMBER, "service_group_member", Codec::Legacy, Some("services_servicegroups"), legacy::decode_service_group_member);
        entry!(m, SERVICE, "service", Codec::Legacy, Some("services"), legacy::decode_service);
        entry!(m, SERVICE_STATUS, "service_status", Codec::Legacy, Some("services"), legacy::decode_service_status);

        // neb, protobuf
        entry!(m, PB_SERVICE, "pb_service", Codec::Proto, Some("services"), proto::decode_service);
        entry!(m, PB_ADAPTIVE_SERVICE, "pb_adaptive_service", Codec::Proto, Some("services"), proto::decode_adaptive_service);
        entry!(m, PB_SERVICE_STATUS, "pb_service_status", Codec::Proto, Some("services"), proto::decode_service_status);
        entry!(m, PB_HOST, "pb_host", Codec::Proto, Some("hosts"), proto::decode_host);
        entry!(m, PB_ADAPTIVE_HOST, "pb_adaptive_host", Codec::Proto, Some("hosts"), proto::decode_adaptive_host);
        entry!(m, PB_HOST_STATUS, "pb_host_status", Codec::Proto, Some("hosts"), proto::decode_host_status);
        entry!(m, PB_SEVERITY, "pb_severity", Codec::Proto, Some("severities"), proto::decode_severity);
        entry!(m, PB_TAG, "pb_tag", Codec::Proto, Some("tags"), proto::decode_tag);
        entry!(m, PB_COMMENT, "pb_comment", Codec::Proto, Some("comments"), proto::decode_comment);
        entry!(m, PB_DOWNTIME, "pb_downtime", Codec::Proto, Some("downtimes"), proto::decode_downtime);
        entry!(m, PB_CUSTOM_VARIABLE, "pb_custom_variable", Codec::Proto, Some("customvariables"), proto::decode_custom_variable);
        entry!(m, PB_CUSTOM_VARIABLE_STATUS, "pb_custom_variable_status", Codec::Proto, Some("customvariables"), proto::decode_custom_variable_status);
        entry!(m, PB_HOST_CHECK, "pb_host_check", Codec::Proto, Some("hosts"), proto::decode_host_check);
        entry!(m, PB_SERVICE_CHECK, "pb_service_check", Codec::Proto, Some("services"), proto::decode_service_check);
        entry!(m, PB_LOG_ENTRY, "pb_log_entry", Codec::Proto, Some("logs"), proto::decode_log_entry);
        entry!(m, PB_INSTANCE_STATUS, "pb_instance_status", Codec::Proto, Some("instances"), proto::decode_instance_status);
        entry!(m, PB_MODULE, "pb_module", Codec::Proto, Some("modules"), proto::decode_module);
        entry!(m, PB_INSTANCE, "pb_instance", Codec::Proto, Some("instances"), proto::decode_instance);
        entry!(m, PB_ACKNOWLEDGEMENT, "pb_acknowledgement", Codec::Proto, Some("acknowledgements"), proto::decode_acknowledgement);
        entry!(m, PB_HOST_DEPENDENCY, "pb_host_dependency", Codec::Proto, Some("hosts_hosts_dependencies"), proto::decode_host_dependency);
        entry!(m, PB_SERVICE_DEPENDENCY, "pb_service_dependency", Codec::Proto, Some("services_services_dependencies"), proto::decode_service_dependency);
        entry!(m, PB_HOST_GROUP, "pb_host_group", Codec::Proto, Some("hostgroups"), proto::decode_host_group);
        entry!(m, PB_HOST_GROUP_MEMBER, "pb_host_group_member", Codec::Proto, Some("hosts_hostgroups"), proto::decode_host_group_member);
        entry!(m, PB_SERVICE_GROUP, "pb_service_group", Codec::Proto, Some("servicegroups"), proto::decode_service_group);
        entry!(m, PB_SERVICE_GROUP_MEMBER, "pb_service_group_member", Codec::Proto, Some("services_servicegroups"), proto::decode_service_group_member);
        entry!(m, PB_HOST_PARENT, "pb_host_parent", Codec::Proto, Some("hosts_hosts_parents"), proto::decode_host_parent);

        // bbdo control
        entry!(m, VERSION_RESPONSE, "version_response", Codec::Legacy, None, legacy::decode_version_response);
        entry!(m, ACK, "ack", Codec::Legacy, None, legacy::decode_ack);

        // storage, legacy
        entry!(m, METRIC, "metric", Codec::Legacy, Some("data_bin"), legacy::decode_metric);
        entry!(m, REBUILD, "rebuild", Codec::Legacy, None, legacy::decode_rebuild);
        entry!(m, REMOVE_GRAPH, "remove_graph", Codec::Legacy, None, legacy::decode_remove_graph);
        entry!(m, STATUS, "status", Codec::Legacy, None, legacy::decode_status);
        entry!(m, INDEX_MAPPING, "index_mapping", Codec::Legacy, Some("index_data"), legacy::decode_index_mapping);
        entry!(m, METRIC_MAPPING, "metric_mapping", Codec::Legacy, Some("metrics"), legacy::decode_metric_mapping);

        // storage, protobuf
        entry!(m, PB_METRIC, "pb_metric", Codec::Proto, Some("data_bin"), proto::decode_metric);
        entry!(m, PB_REBUILD, "pb_rebuild", Codec::Proto, None, proto::decode_rebuild);
        entry!(m, PB_REMOVE_GRAPH, "pb_remove_graph", Codec::Proto, None, proto::decode_remove_graph);
        entry!(m, PB_STATUS, "pb_status", Codec::Proto, None, proto::decode_status);
        entry!(m, PB_INDEX_MAPPING, "pb_index_mapping", Codec::Proto, Some("index_data"), proto::decode_index_mapping);
        entry!(m, PB_METRIC_MAPPING, "pb_metric_mapping", Codec::Proto, Some("metrics"), proto::decode_metric_mapping);

        Self { entries: m }
    }

    /// Look up a type id
    #[inline]
    pub fn get(&self, id: EventType) -> Option<&EventInfo> {
        self.entries.get(&id.0)
    }

    /// Whether the id is known
    #[inline]
    pub fn contains(&self, id: EventType) -> bool {
        self.entries.contains_key(&id.0)
    }

    /// Number of registered type ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no type is registered (never, after bootstrap)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all registered ids (test and stats helper)
    pub fn type_ids(&self) -> impl Iterator<Item = EventType> + '_ {
        self.entries.keys().copied().map(EventType)
    }
}

/// Routed unit of work
///
/// `source_id`/`destination_id` route events between broker nodes; zero
/// means "local". The payload is immutable after decode; fan-out shares it
/// by value.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub type_id: EventType,
    pub source_id: u32,
    pub destination_id: u32,
    pub payload: Payload,
}

impl Event {
    /// Build a locally-originated event
    pub fn new(type_id: EventType, payload: Payload) -> Self {
        Self {
            type_id,
            source_id: 0,
            destination_id: 0,
            payload,
        }
    }

    /// Set routing ids
    #[must_use]
    pub fn with_routing(mut self, source_id: u32, destination_id: u32) -> Self {
        self.source_id = source_id;
        self.destination_id = destination_id;
        self
    }

    /// Encode the payload according to the type id's codec family
    pub fn encode_payload(&self, registry: &Registry) -> Result<Vec<u8>> {
        let info = registry
            .get(self.type_id)
            .ok_or(CodecError::UnknownType(self.type_id.0))?;
        let mut buf = Vec::with_capacity(256);
        match info.codec {
            Codec::Legacy => legacy::encode(&self.payload, &mut buf)?,
            Codec::Proto => proto::encode(&self.payload, &mut buf)?,
        }
        Ok(buf)
    }
}
