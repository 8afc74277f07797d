//! Monitoring fact structs
//!
//! Every event kind the broker routes or persists, in its decoded form.
//! Legacy and protobuf type ids both decode into these structs; the codec
//! family lives in the registry entry, not here.
//!
//! Field sets follow the operational schema: identity keys first, then the
//! state machine, scheduling, and notification/acknowledgement derivatives.
//! Timestamps are Unix seconds (`i64`), zero meaning "never".

/// Action carried by referential events (severity, tag)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RefAction {
    /// Create or refresh the row
    #[default]
    Add = 1,
    /// Update an existing row
    Modify = 2,
    /// Remove the row
    Delete = 3,
}

impl RefAction {
    /// Parse from raw wire value; unknown values map to `Add`
    pub const fn from_u32(value: u32) -> Self {
        match value {
            2 => Self::Modify,
            3 => Self::Delete,
            _ => Self::Add,
        }
    }

    /// Convert to raw wire value
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Tag classification, mirrored in the `tags.type` column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TagKind {
    #[default]
    ServiceGroup = 0,
    HostGroup = 1,
    ServiceCategory = 2,
    HostCategory = 3,
}

impl TagKind {
    /// Parse from raw wire value; unknown values map to `ServiceGroup`
    pub const fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::HostGroup,
            2 => Self::ServiceCategory,
            3 => Self::HostCategory,
            _ => Self::ServiceGroup,
        }
    }

    /// Convert to raw wire value
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Reference to a tag carried inline by host/service events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagRef {
    pub id: u64,
    pub kind: TagKind,
}

// =============================================================================
// Poller lifecycle
// =============================================================================

/// Poller declaration, sent at startup and shutdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub instance_id: u32,
    pub name: String,
    pub running: bool,
    pub start_time: i64,
    pub end_time: i64,
    pub pid: i32,
    pub version: String,
}

/// Periodic poller heartbeat with engine-wide toggles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceStatus {
    pub instance_id: u32,
    pub last_alive: i64,
    pub last_command_check: i64,
    pub active_host_checks_enabled: bool,
    pub active_service_checks_enabled: bool,
    pub passive_host_checks_enabled: bool,
    pub passive_service_checks_enabled: bool,
    pub event_handlers_enabled: bool,
    pub flap_detection_enabled: bool,
    pub notifications_enabled: bool,
    pub obsess_over_hosts: bool,
    pub obsess_over_services: bool,
    pub global_host_event_handler: String,
    pub global_service_event_handler: String,
}

/// Module loaded (or unloaded) inside a poller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub instance_id: u32,
    pub filename: String,
    pub args: String,
    pub enabled: bool,
    pub loaded: bool,
    pub should_be_loaded: bool,
}

// =============================================================================
// Host / service configuration
// =============================================================================

/// Host definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Host {
    pub host_id: u32,
    pub instance_id: u32,
    pub name: String,
    pub alias: String,
    pub address: String,
    pub display_name: String,
    pub enabled: bool,
    pub check_command: String,
    pub check_interval: f64,
    pub retry_interval: f64,
    pub max_check_attempts: i32,
    pub check_period: String,
    pub active_checks_enabled: bool,
    pub passive_checks_enabled: bool,
    pub check_freshness: bool,
    pub freshness_threshold: f64,
    pub event_handler: String,
    pub event_handler_enabled: bool,
    pub flap_detection_enabled: bool,
    pub low_flap_threshold: f64,
    pub high_flap_threshold: f64,
    pub obsess_over: bool,
    pub notification_interval: f64,
    pub notification_period: String,
    pub notifications_enabled: bool,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    pub icon_image: String,
    /// Protobuf form only; empty on legacy events
    pub severity_id: u64,
    /// Protobuf form only; empty on legacy events
    pub tags: Vec<TagRef>,
}

/// Service definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub host_id: u32,
    pub service_id: u32,
    pub description: String,
    pub display_name: String,
    pub enabled: bool,
    pub check_command: String,
    pub check_interval: f64,
    pub retry_interval: f64,
    pub max_check_attempts: i32,
    pub check_period: String,
    pub active_checks_enabled: bool,
    pub passive_checks_enabled: bool,
    pub check_freshness: bool,
    pub freshness_threshold: f64,
    pub event_handler: String,
    pub event_handler_enabled: bool,
    pub flap_detection_enabled: bool,
    pub low_flap_threshold: f64,
    pub high_flap_threshold: f64,
    pub is_volatile: bool,
    pub obsess_over: bool,
    pub notification_interval: f64,
    pub notification_period: String,
    pub notifications_enabled: bool,
    pub notes: String,
    pub notes_url: String,
    pub action_url: String,
    pub icon_image: String,
    /// Protobuf form only; empty on legacy events
    pub severity_id: u64,
    /// Protobuf form only; empty on legacy events
    pub tags: Vec<TagRef>,
}

/// Partial host update; only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptiveHost {
    pub host_id: u32,
    pub notifications_enabled: Option<bool>,
    pub active_checks_enabled: Option<bool>,
    pub passive_checks_enabled: Option<bool>,
    pub event_handler_enabled: Option<bool>,
    pub flap_detection_enabled: Option<bool>,
    pub obsess_over: Option<bool>,
    pub check_freshness: Option<bool>,
    pub check_interval: Option<f64>,
    pub retry_interval: Option<f64>,
    pub max_check_attempts: Option<i32>,
    pub check_command: Option<String>,
    pub check_period: Option<String>,
    pub event_handler: Option<String>,
}

/// Partial service update; only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptiveService {
    pub host_id: u32,
    pub service_id: u32,
    pub notifications_enabled: Option<bool>,
    pub active_checks_enabled: Option<bool>,
    pub passive_checks_enabled: Option<bool>,
    pub event_handler_enabled: Option<bool>,
    pub flap_detection_enabled: Option<bool>,
    pub obsess_over: Option<bool>,
    pub check_freshness: Option<bool>,
    pub is_volatile: Option<bool>,
    pub check_interval: Option<f64>,
    pub retry_interval: Option<f64>,
    pub max_check_attempts: Option<i32>,
    pub check_command: Option<String>,
    pub check_period: Option<String>,
    pub event_handler: Option<String>,
}

/// Command line resolved for a host check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostCheck {
    pub host_id: u32,
    pub command_line: String,
    /// 0 = active, 1 = passive
    pub check_type: i16,
    pub active_checks_enabled: bool,
    pub next_check: i64,
}

/// Command line resolved for a service check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceCheck {
    pub host_id: u32,
    pub service_id: u32,
    pub command_line: String,
    /// 0 = active, 1 = passive
    pub check_type: i16,
    pub active_checks_enabled: bool,
    pub next_check: i64,
}

// =============================================================================
// Host / service status
// =============================================================================

/// Host check result and runtime state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostStatus {
    pub host_id: u32,
    pub checked: bool,
    /// 0 = active, 1 = passive
    pub check_type: i16,
    pub current_state: i16,
    pub state_type: i16,
    pub current_check_attempt: i16,
    pub last_check: i64,
    pub next_check: i64,
    pub last_state_change: i64,
    pub last_hard_state: i16,
    pub last_hard_state_change: i64,
    pub last_time_up: i64,
    pub last_time_down: i64,
    pub last_time_unreachable: i64,
    pub output: String,
    pub perfdata: String,
    pub flapping: bool,
    pub percent_state_change: f64,
    pub latency: f64,
    pub execution_time: f64,
    pub acknowledged: bool,
    pub acknowledgement_type: i16,
    pub scheduled_downtime_depth: i16,
    pub should_be_scheduled: bool,
    pub notification_number: i16,
    pub last_notification: i64,
    pub next_notification: i64,
    pub no_more_notifications: bool,
}

/// Service check result and runtime state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceStatus {
    pub host_id: u32,
    pub service_id: u32,
    pub checked: bool,
    /// 0 = active, 1 = passive
    pub check_type: i16,
    pub current_state: i16,
    pub state_type: i16,
    pub current_check_attempt: i16,
    pub last_check: i64,
    pub next_check: i64,
    pub check_interval: f64,
    pub last_state_change: i64,
    pub last_hard_state: i16,
    pub last_hard_state_change: i64,
    pub last_time_ok: i64,
    pub last_time_warning: i64,
    pub last_time_critical: i64,
    pub last_time_unknown: i64,
    pub output: String,
    pub perfdata: String,
    pub flapping: bool,
    pub percent_state_change: f64,
    pub latency: f64,
    pub execution_time: f64,
    pub acknowledged: bool,
    pub acknowledgement_type: i16,
    pub scheduled_downtime_depth: i16,
    pub should_be_scheduled: bool,
    pub notification_number: i16,
    pub last_notification: i64,
    pub next_notification: i64,
    pub no_more_notifications: bool,
}

// =============================================================================
// Event-like rows (bulk loaded through staging queues)
// =============================================================================

/// Operator or engine comment on a host/service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub instance_id: u32,
    pub host_id: u32,
    pub service_id: u32,
    pub internal_id: u32,
    pub author: String,
    pub data: String,
    pub comment_type: i16,
    pub entry_type: i16,
    pub entry_time: i64,
    pub deletion_time: i64,
    pub expire_time: i64,
    pub expires: bool,
    pub persistent: bool,
    pub source: i16,
}

/// Scheduled or flexible downtime window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Downtime {
    pub instance_id: u32,
    pub host_id: u32,
    pub service_id: u32,
    pub internal_id: u32,
    pub author: String,
    pub comment: String,
    pub downtime_type: i16,
    pub entry_time: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub actual_start_time: i64,
    pub actual_end_time: i64,
    pub duration: i64,
    pub triggered_by: u32,
    pub fixed: bool,
    pub started: bool,
    pub cancelled: bool,
    pub deletion_time: i64,
}

/// Problem acknowledgement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acknowledgement {
    pub instance_id: u32,
    pub host_id: u32,
    pub service_id: u32,
    pub author: String,
    pub comment: String,
    pub entry_time: i64,
    pub deletion_time: i64,
    pub acknowledgement_type: i16,
    pub state: i16,
    pub is_sticky: bool,
    pub notify_contacts: bool,
    pub persistent_comment: bool,
}

/// Custom variable definition on a host or service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomVariable {
    pub host_id: u32,
    pub service_id: u32,
    pub name: String,
    pub value: String,
    pub default_value: String,
    pub var_type: i16,
    pub modified: bool,
    pub update_time: i64,
    pub enabled: bool,
}

/// Custom variable value change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomVariableStatus {
    pub host_id: u32,
    pub service_id: u32,
    pub name: String,
    pub value: String,
    pub modified: bool,
    pub update_time: i64,
}

/// Engine log line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    pub ctime: i64,
    pub instance_name: String,
    pub host_id: u32,
    pub host_name: String,
    pub service_id: u32,
    pub service_description: String,
    pub output: String,
    pub status: i16,
    pub msg_type: i16,
    pub retry: i32,
    pub notification_cmd: String,
    pub notification_contact: String,
}

// =============================================================================
// Relations
// =============================================================================

/// Parent/child edge of the host reachability DAG
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostParent {
    pub child_id: u32,
    pub parent_id: u32,
    pub enabled: bool,
}

/// Host-to-host dependency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostDependency {
    pub host_id: u32,
    pub dependent_host_id: u32,
    pub dependency_period: String,
    pub execution_failure_options: String,
    pub notification_failure_options: String,
    pub inherits_parent: bool,
    pub enabled: bool,
}

/// Service-to-service dependency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDependency {
    pub host_id: u32,
    pub service_id: u32,
    pub dependent_host_id: u32,
    pub dependent_service_id: u32,
    pub dependency_period: String,
    pub execution_failure_options: String,
    pub notification_failure_options: String,
    pub inherits_parent: bool,
    pub enabled: bool,
}

/// Host group definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostGroup {
    pub hostgroup_id: u32,
    pub instance_id: u32,
    pub name: String,
    pub enabled: bool,
}

/// Host group membership edge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostGroupMember {
    pub hostgroup_id: u32,
    pub instance_id: u32,
    pub host_id: u32,
    pub enabled: bool,
}

/// Service group definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceGroup {
    pub servicegroup_id: u32,
    pub instance_id: u32,
    pub name: String,
    pub enabled: bool,
}

/// Service group membership edge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceGroupMember {
    pub servicegroup_id: u32,
    pub instance_id: u32,
    pub host_id: u32,
    pub service_id: u32,
    pub enabled: bool,
}

// =============================================================================
// Referential (severity, tag)
// =============================================================================

/// Severity referential row, addressed by `(id, type)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Severity {
    pub action: RefAction,
    pub id: u64,
    /// 0 = service severity, 1 = host severity
    pub severity_type: u32,
    pub level: u32,
    pub icon_id: u64,
    pub name: String,
    pub instance_id: u32,
}

/// Tag referential row, addressed by `(id, type)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub action: RefAction,
    pub id: u64,
    pub kind: TagKind,
    pub name: String,
    pub instance_id: u32,
}

// =============================================================================
// Storage category (perfdata pipeline, consumed by the RRD writer)
// =============================================================================

/// One sample of one metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    pub time: i64,
    pub interval: u32,
    pub metric_id: u64,
    pub name: String,
    pub rrd_len: i32,
    pub value: f64,
    /// Data source type (gauge/counter/derive/absolute)
    pub value_type: i16,
    pub host_id: u32,
    pub service_id: u32,
}

/// State sample for an index (drives the status RRD)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfStatus {
    pub time: i64,
    pub index_id: u64,
    pub interval: u32,
    pub rrd_len: i32,
    pub state: i16,
}

/// New `(host, service) -> index` binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexMapping {
    pub index_id: u64,
    pub host_id: u32,
    pub service_id: u32,
}

/// New `(index, metric) -> metric id` binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricMapping {
    pub index_id: u64,
    pub metric_id: u64,
}

/// RRD rebuild window marker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rebuild {
    pub id: u64,
    pub is_index: bool,
    pub end: bool,
}

/// Graph removal request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveGraph {
    pub id: u64,
    pub is_index: bool,
}

// =============================================================================
// Control frames (bbdo category)
// =============================================================================

/// First frame of every connection; carries the speaker's protocol version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionResponse {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    /// Space-separated extension names offered by the speaker
    pub extensions: String,
}

/// Consumption acknowledgement; advances the sender's confirmed cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AckFrame {
    pub acknowledged_events: u32,
}

// =============================================================================
// Payload
// =============================================================================

/// Decoded payload of an [`Event`](crate::Event)
///
/// One variant per fact; the wire representation (legacy vs protobuf) is a
/// property of the event's type id, not of the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Instance(Instance),
    InstanceStatus(InstanceStatus),
    Module(Module),
    Host(Host),
    Service(Service),
    AdaptiveHost(AdaptiveHost),
    AdaptiveService(AdaptiveService),
    HostCheck(HostCheck),
    ServiceCheck(ServiceCheck),
    HostStatus(HostStatus),
    ServiceStatus(ServiceStatus),
    Comment(Comment),
    Downtime(Downtime),
    Acknowledgement(Acknowledgement),
    CustomVariable(CustomVariable),
    CustomVariableStatus(CustomVariableStatus),
    LogEntry(LogEntry),
    HostParent(HostParent),
    HostDependency(HostDependency),
    ServiceDependency(ServiceDependency),
    HostGroup(HostGroup),
    HostGroupMember(HostGroupMember),
    ServiceGroup(ServiceGroup),
    ServiceGroupMember(ServiceGroupMember),
    Severity(Severity),
    Tag(Tag),
    Metric(Metric),
    PerfStatus(PerfStatus),
    IndexMapping(IndexMapping),
    MetricMapping(MetricMapping),
    Rebuild(Rebuild),
    RemoveGraph(RemoveGraph),
    VersionResponse(VersionResponse),
    Ack(AckFrame),
}

impl Payload {
    /// Short kind name, used in logs and the stats snapshot
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Instance(_) => "instance",
            Self::InstanceStatus(_) => "instance_status",
            Self::Module(_) => "module",
            Self::Host(_) => "host",
            Self::Service(_) => "service",
            Self::AdaptiveHost(_) => "adaptive_host",
            Self::AdaptiveService(_) => "adaptive_service",
            Self::HostCheck(_) => "host_check",
            Self::ServiceCheck(_) => "service_check",
            Self::HostStatus(_) => "host_status",
            Self::ServiceStatus(_) => "service_status",
            Self::Comment(_) => "comment",
            Self::Downtime(_) => "downtime",
            Self::Acknowledgement(_) => "acknowledgement",
            Self::CustomVariable(_) => "custom_variable",
            Self::CustomVariableStatus(_) => "custom_variable_status",
            Self::LogEntry(_) => "log_entry",
            Self::HostParent(_) => "host_parent",
            Self::HostDependency(_) => "host_dependency",
            Self::ServiceDependency(_) => "service_dependency",
            Self::HostGroup(_) => "host_group",
            Self::HostGroupMember(_) => "host_group_member",
            Self::ServiceGroup(_) => "service_group",
            Self::ServiceGroupMember(_) => "service_group_member",
            Self::Severity(_) => "severity",
            Self::Tag(_) => "tag",
            Self::Metric(_) => "metric",
            Self::PerfStatus(_) => "status",
            Self::IndexMapping(_) => "index_mapping",
            Self::MetricMapping(_) => "metric_mapping",
            Self::Rebuild(_) => "rebuild",
            Self::RemoveGraph(_) => "remove_graph",
            Self::VersionResponse(_) => "version_response",
            Self::Ack(_) => "ack",
        }
    }
}
