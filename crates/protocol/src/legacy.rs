//! Legacy flat-field payload codec
//!
//! Fields are written in registry order with fixed-width big-endian
//! encodings: bool as one byte, integers at their natural width, doubles as
//! IEEE-754, strings as NUL-terminated UTF-8. There is no tagging; both
//! sides must agree on the field list, which is why the version handshake
//! happens before any data frame.
//!
//! Proto-only facts (adaptive updates, severities, tags) have no legacy
//! representation and encode to [`CodecError::Unrepresentable`].

use crate::error::CodecError;
use crate::events::*;
use crate::Result;

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated {
                field,
                needed: n - self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn bool(&mut self, field: &'static str) -> Result<bool> {
        Ok(self.take(1, field)?[0] != 0)
    }

    fn i16(&mut self, field: &'static str) -> Result<i16> {
        let b = self.take(2, field)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn u16(&mut self, field: &'static str) -> Result<u16> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn i32(&mut self, field: &'static str) -> Result<i32> {
        let b = self.take(4, field)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self, field: &'static str) -> Result<i64> {
        let b = self.take(8, field)?;
        Ok(i64::from_be_bytes(b.try_into().unwrap()))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64> {
        let b = self.take(8, field)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    fn f64(&mut self, field: &'static str) -> Result<f64> {
        let b = self.take(8, field)?;
        Ok(f64::from_be_bytes(b.try_into().unwrap()))
    }

    fn string(&mut self, field: &'static str) -> Result<String> {
        let nul = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::UnterminatedString(field))?;
        let s = std::str::from_utf8(&self.buf[..nul])
            .map_err(|_| CodecError::InvalidUtf8(field))?
            .to_owned();
        self.buf = &self.buf[nul + 1..];
        Ok(s)
    }
}

struct Writer<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> Writer<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out }
    }

    fn bool(&mut self, v: bool) {
        self.out.push(v as u8);
    }

    fn i16(&mut self, v: i16) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn string(&mut self, v: &str) {
        self.out.extend_from_slice(v.as_bytes());
        self.out.push(0);
    }
}

// =============================================================================
// Decoders (registered in the type table)
// =============================================================================

pub(crate) fn decode_instance(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Instance(Instance {
        instance_id: r.u32("instance_id")?,
        name: r.string("name")?,
        running: r.bool("running")?,
        start_time: r.i64("start_time")?,
        end_time: r.i64("end_time")?,
        pid: r.i32("pid")?,
        version: r.string("version")?,
    }))
}

pub(crate) fn decode_instance_status(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::InstanceStatus(InstanceStatus {
        instance_id: r.u32("instance_id")?,
        last_alive: r.i64("last_alive")?,
        last_command_check: r.i64("last_command_check")?,
        active_host_checks_enabled: r.bool("active_host_checks_enabled")?,
        active_service_checks_enabled: r.bool("active_service_checks_enabled")?,
        passive_host_checks_enabled: r.bool("passive_host_checks_enabled")?,
        passive_service_checks_enabled: r.bool("passive_service_checks_enabled")?,
        event_handlers_enabled: r.bool("event_handlers_enabled")?,
        flap_detection_enabled: r.bool("flap_detection_enabled")?,
        notifications_enabled: r.bool("notifications_enabled")?,
        obsess_over_hosts: r.bool("obsess_over_hosts")?,
        obsess_over_services: r.bool("obsess_over_services")?,
        global_host_event_handler: r.string("global_host_event_handler")?,
        global_service_event_handler: r.string("global_service_event_handler")?,
    }))
}

pub(crate) fn decode_module(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Module(Module {
        instance_id: r.u32("instance_id")?,
        filename: r.string("filename")?,
        args: r.string("args")?,
        enabled: r.bool("enabled")?,
        loaded: r.bool("loaded")?,
        should_be_loaded: r.bool("should_be_loaded")?,
    }))
}

fn read_host(r: &mut Reader<'_>) -> Result<Host> {
    Ok(Host {
        host_id: r.u32("host_id")?,
        instance_id: r.u32("instance_id")?,
        name: r.string("name")?,
        alias: r.string("alias")?,
        address: r.string("address")?,
        display_name: r.string("display_name")?,
        enabled: r.bool("enabled")?,
        check_command: r.string("check_command")?,
        check_interval: r.f64("check_interval")?,
        retry_interval: r.f64("retry_interval")?,
        max_check_attempts: r.i32("max_check_attempts")?,
        check_period: r.string("check_period")?,
        active_checks_enabled: r.bool("active_checks_enabled")?,
        passive_checks_enabled: r.bool("passive_checks_enabled")?,
        check_freshness: r.bool("check_freshness")?,
        freshness_threshold: r.f64("freshness_threshold")?,
        event_handler: r.string("event_handler")?,
        event_handler_enabled: r.bool("event_handler_enabled")?,
        flap_detection_enabled: r.bool("flap_detection_enabled")?,
        low_flap_threshold: r.f64("low_flap_threshold")?,
        high_flap_threshold: r.f64("high_flap_threshold")?,
        obsess_over: r.bool("obsess_over")?,
        notification_interval: r.f64("notification_interval")?,
        notification_period: r.string("notification_period")?,
        notifications_enabled: r.bool("notifications_enabled")?,
        notes: r.string("notes")?,
        notes_url: r.string("notes_url")?,
        action_url: r.string("action_url")?,
        icon_image: r.string("icon_image")?,
        severity_id: 0,
        tags: Vec::new(),
    })
}

pub(crate) fn decode_host(buf: &[u8]) -> Result<Payload> {
    Ok(Payload::Host(read_host(&mut Reader::new(buf))?))
}

fn read_service(r: &mut Reader<'_>) -> Result<Service> {
    Ok(Service {
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        description: r.string("description")?,
        display_name: r.string("display_name")?,
        enabled: r.bool("enabled")?,
        check_command: r.string("check_command")?,
        check_interval: r.f64("check_interval")?,
        retry_interval: r.f64("retry_interval")?,
        max_check_attempts: r.i32("max_check_attempts")?,
        check_period: r.string("check_period")?,
        active_checks_enabled: r.bool("active_checks_enabled")?,
        passive_checks_enabled: r.bool("passive_checks_enabled")?,
        check_freshness: r.bool("check_freshness")?,
        freshness_threshold: r.f64("freshness_threshold")?,
        event_handler: r.string("event_handler")?,
        event_handler_enabled: r.bool("event_handler_enabled")?,
        flap_detection_enabled: r.bool("flap_detection_enabled")?,
        low_flap_threshold: r.f64("low_flap_threshold")?,
        high_flap_threshold: r.f64("high_flap_threshold")?,
        is_volatile: r.bool("is_volatile")?,
        obsess_over: r.bool("obsess_over")?,
        notification_interval: r.f64("notification_interval")?,
        notification_period: r.string("notification_period")?,
        notifications_enabled: r.bool("notifications_enabled")?,
        notes: r.string("notes")?,
        notes_url: r.string("notes_url")?,
        action_url: r.string("action_url")?,
        icon_image: r.string("icon_image")?,
        severity_id: 0,
        tags: Vec::new(),
    })
}

pub(crate) fn decode_service(buf: &[u8]) -> Result<Payload> {
    Ok(Payload::Service(read_service(&mut Reader::new(buf))?))
}

pub(crate) fn decode_host_check(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::HostCheck(HostCheck {
        host_id: r.u32("host_id")?,
        command_line: r.string("command_line")?,
        check_type: r.i16("check_type")?,
        active_checks_enabled: r.bool("active_checks_enabled")?,
        next_check: r.i64("next_check")?,
    }))
}

pub(crate) fn decode_service_check(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::ServiceCheck(ServiceCheck {
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        command_line: r.string("command_line")?,
        check_type: r.i16("check_type")?,
        active_checks_enabled: r.bool("active_checks_enabled")?,
        next_check: r.i64("next_check")?,
    }))
}

fn read_host_status(r: &mut Reader<'_>) -> Result<HostStatus> {
    Ok(HostStatus {
        host_id: r.u32("host_id")?,
        checked: r.bool("checked")?,
        check_type: r.i16("check_type")?,
        current_state: r.i16("current_state")?,
        state_type: r.i16("state_type")?,
        current_check_attempt: r.i16("current_check_attempt")?,
        last_check: r.i64("last_check")?,
        next_check: r.i64("next_check")?,
        last_state_change: r.i64("last_state_change")?,
        last_hard_state: r.i16("last_hard_state")?,
        last_hard_state_change: r.i64("last_hard_state_change")?,
        last_time_up: r.i64("last_time_up")?,
        last_time_down: r.i64("last_time_down")?,
        last_time_unreachable: r.i64("last_time_unreachable")?,
        output: r.string("output")?,
        perfdata: r.string("perfdata")?,
        flapping: r.bool("flapping")?,
        percent_state_change: r.f64("percent_state_change")?,
        latency: r.f64("latency")?,
        execution_time: r.f64("execution_time")?,
        acknowledged: r.bool("acknowledged")?,
        acknowledgement_type: r.i16("acknowledgement_type")?,
        scheduled_downtime_depth: r.i16("scheduled_downtime_depth")?,
        should_be_scheduled: r.bool("should_be_scheduled")?,
        notification_number: r.i16("notification_number")?,
        last_notification: r.i64("last_notification")?,
        next_notification: r.i64("next_notification")?,
        no_more_notifications: r.bool("no_more_notifications")?,
    })
}

pub(crate) fn decode_host_status(buf: &[u8]) -> Result<Payload> {
    Ok(Payload::HostStatus(read_host_status(&mut Reader::new(
        buf,
    ))?))
}

fn read_service_status(r: &mut Reader<'_>) -> Result<ServiceStatus> {
    Ok(ServiceStatus {
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        checked: r.bool("checked")?,
        check_type: r.i16("check_type")?,
        current_state: r.i16("current_state")?,
        state_type: r.i16("state_type")?,
        current_check_attempt: r.i16("current_check_attempt")?,
        last_check: r.i64("last_check")?,
        next_check: r.i64("next_check")?,
        check_interval: r.f64("check_interval")?,
        last_state_change: r.i64("last_state_change")?,
        last_hard_state: r.i16("last_hard_state")?,
        last_hard_state_change: r.i64("last_hard_state_change")?,
        last_time_ok: r.i64("last_time_ok")?,
        last_time_warning: r.i64("last_time_warning")?,
        last_time_critical: r.i64("last_time_critical")?,
        last_time_unknown: r.i64("last_time_unknown")?,
        output: r.string("output")?,
        perfdata: r.string("perfdata")?,
        flapping: r.bool("flapping")?,
        percent_state_change: r.f64("percent_state_change")?,
        latency: r.f64("latency")?,
        execution_time: r.f64("execution_time")?,
        acknowledged: r.bool("acknowledged")?,
        acknowledgement_type: r.i16("acknowledgement_type")?,
        scheduled_downtime_depth: r.i16("scheduled_downtime_depth")?,
        should_be_scheduled: r.bool("should_be_scheduled")?,
        notification_number: r.i16("notification_number")?,
        last_notification: r.i64("last_notification")?,
        next_notification: r.i64("next_notification")?,
        no_more_notifications: r.bool("no_more_notifications")?,
    })
}

pub(crate) fn decode_service_status(buf: &[u8]) -> Result<Payload> {
    Ok(Payload::ServiceStatus(read_service_status(
        &mut Reader::new(buf),
    )?))
}

pub(crate) fn decode_comment(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Comment(Comment {
        instance_id: r.u32("instance_id")?,
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        internal_id: r.u32("internal_id")?,
        author: r.string("author")?,
        data: r.string("data")?,
        comment_type: r.i16("comment_type")?,
        entry_type: r.i16("entry_type")?,
        entry_time: r.i64("entry_time")?,
        deletion_time: r.i64("deletion_time")?,
        expire_time: r.i64("expire_time")?,
        expires: r.bool("expires")?,
        persistent: r.bool("persistent")?,
        source: r.i16("source")?,
    }))
}

pub(crate) fn decode_downtime(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Downtime(Downtime {
        instance_id: r.u32("instance_id")?,
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        internal_id: r.u32("internal_id")?,
        author: r.string("author")?,
        comment: r.string("comment")?,
        downtime_type: r.i16("downtime_type")?,
        entry_time: r.i64("entry_time")?,
        start_time: r.i64("start_time")?,
        end_time: r.i64("end_time")?,
        actual_start_time: r.i64("actual_start_time")?,
        actual_end_time: r.i64("actual_end_time")?,
        duration: r.i64("duration")?,
        triggered_by: r.u32("triggered_by")?,
        fixed: r.bool("fixed")?,
        started: r.bool("started")?,
        cancelled: r.bool("cancelled")?,
        deletion_time: r.i64("deletion_time")?,
    }))
}

pub(crate) fn decode_acknowledgement(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Acknowledgement(Acknowledgement {
        instance_id: r.u32("instance_id")?,
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        author: r.string("author")?,
        comment: r.string("comment")?,
        entry_time: r.i64("entry_time")?,
        deletion_time: r.i64("deletion_time")?,
        acknowledgement_type: r.i16("acknowledgement_type")?,
        state: r.i16("state")?,
        is_sticky: r.bool("is_sticky")?,
        notify_contacts: r.bool("notify_contacts")?,
        persistent_comment: r.bool("persistent_comment")?,
    }))
}

pub(crate) fn decode_custom_variable(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::CustomVariable(CustomVariable {
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        name: r.string("name")?,
        value: r.string("value")?,
        default_value: r.string("default_value")?,
        var_type: r.i16("var_type")?,
        modified: r.bool("modified")?,
        update_time: r.i64("update_time")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_custom_variable_status(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::CustomVariableStatus(CustomVariableStatus {
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        name: r.string("name")?,
        value: r.string("value")?,
        modified: r.bool("modified")?,
        update_time: r.i64("update_time")?,
    }))
}

pub(crate) fn decode_log_entry(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::LogEntry(LogEntry {
        ctime: r.i64("ctime")?,
        instance_name: r.string("instance_name")?,
        host_id: r.u32("host_id")?,
        host_name: r.string("host_name")?,
        service_id: r.u32("service_id")?,
        service_description: r.string("service_description")?,
        output: r.string("output")?,
        status: r.i16("status")?,
        msg_type: r.i16("msg_type")?,
        retry: r.i32("retry")?,
        notification_cmd: r.string("notification_cmd")?,
        notification_contact: r.string("notification_contact")?,
    }))
}

pub(crate) fn decode_host_parent(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::HostParent(HostParent {
        child_id: r.u32("child_id")?,
        parent_id: r.u32("parent_id")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_host_dependency(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::HostDependency(HostDependency {
        host_id: r.u32("host_id")?,
        dependent_host_id: r.u32("dependent_host_id")?,
        dependency_period: r.string("dependency_period")?,
        execution_failure_options: r.string("execution_failure_options")?,
        notification_failure_options: r.string("notification_failure_options")?,
        inherits_parent: r.bool("inherits_parent")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_service_dependency(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::ServiceDependency(ServiceDependency {
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        dependent_host_id: r.u32("dependent_host_id")?,
        dependent_service_id: r.u32("dependent_service_id")?,
        dependency_period: r.string("dependency_period")?,
        execution_failure_options: r.string("execution_failure_options")?,
        notification_failure_options: r.string("notification_failure_options")?,
        inherits_parent: r.bool("inherits_parent")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_host_group(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::HostGroup(HostGroup {
        hostgroup_id: r.u32("hostgroup_id")?,
        instance_id: r.u32("instance_id")?,
        name: r.string("name")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_host_group_member(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::HostGroupMember(HostGroupMember {
        hostgroup_id: r.u32("hostgroup_id")?,
        instance_id: r.u32("instance_id")?,
        host_id: r.u32("host_id")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_service_group(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::ServiceGroup(ServiceGroup {
        servicegroup_id: r.u32("servicegroup_id")?,
        instance_id: r.u32("instance_id")?,
        name: r.string("name")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_service_group_member(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::ServiceGroupMember(ServiceGroupMember {
        servicegroup_id: r.u32("servicegroup_id")?,
        instance_id: r.u32("instance_id")?,
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
        enabled: r.bool("enabled")?,
    }))
}

pub(crate) fn decode_metric(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Metric(Metric {
        time: r.i64("time")?,
        interval: r.u32("interval")?,
        metric_id: r.u64("metric_id")?,
        name: r.string("name")?,
        rrd_len: r.i32("rrd_len")?,
        value: r.f64("value")?,
        value_type: r.i16("value_type")?,
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
    }))
}

pub(crate) fn decode_status(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::PerfStatus(PerfStatus {
        time: r.i64("time")?,
        index_id: r.u64("index_id")?,
        interval: r.u32("interval")?,
        rrd_len: r.i32("rrd_len")?,
        state: r.i16("state")?,
    }))
}

pub(crate) fn decode_index_mapping(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::IndexMapping(IndexMapping {
        index_id: r.u64("index_id")?,
        host_id: r.u32("host_id")?,
        service_id: r.u32("service_id")?,
    }))
}

pub(crate) fn decode_metric_mapping(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::MetricMapping(MetricMapping {
        index_id: r.u64("index_id")?,
        metric_id: r.u64("metric_id")?,
    }))
}

pub(crate) fn decode_rebuild(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Rebuild(Rebuild {
        id: r.u64("id")?,
        is_index: r.bool("is_index")?,
        end: r.bool("end")?,
    }))
}

pub(crate) fn decode_remove_graph(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::RemoveGraph(RemoveGraph {
        id: r.u64("id")?,
        is_index: r.bool("is_index")?,
    }))
}

pub(crate) fn decode_version_response(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::VersionResponse(VersionResponse {
        major: r.u16("major")?,
        minor: r.u16("minor")?,
        patch: r.u16("patch")?,
        extensions: r.string("extensions")?,
    }))
}

pub(crate) fn decode_ack(buf: &[u8]) -> Result<Payload> {
    let mut r = Reader::new(buf);
    Ok(Payload::Ack(AckFrame {
        acknowledged_events: r.u32("acknowledged_events")?,
    }))
}

// =============================================================================
// Encoder
// =============================================================================

/// Encode a payload in its legacy representation
pub(crate) fn encode(payload: &Payload, out: &mut Vec<u8>) -> Result<()> {
    let mut w = Writer::new(out);
    match payload {
        Payload::Instance(e) => {
            w.u32(e.instance_id);
            w.string(&e.name);
            w.bool(e.running);
            w.i64(e.start_time);
            w.i64(e.end_time);
            w.i32(e.pid);
            w.string(&e.version);
        }
        Payload::InstanceStatus(e) => {
            w.u32(e.instance_id);
            w.i64(e.last_alive);
            w.i64(e.last_command_check);
            w.bool(e.active_host_checks_enabled);
            w.bool(e.active_service_checks_enabled);
            w.bool(e.passive_host_checks_enabled);
            w.bool(e.passive_service_checks_enabled);
            w.bool(e.event_handlers_enabled);
            w.bool(e.flap_detection_enabled);
            w.bool(e.notifications_enabled);
            w.bool(e.obsess_over_hosts);
            w.bool(e.obsess_over_services);
            w.string(&e.global_host_event_handler);
            w.string(&e.global_service_event_handler);
        }
        Payload::Module(e) => {
            w.u32(e.instance_id);
            w.string(&e.filename);
            w.string(&e.args);
            w.bool(e.enabled);
            w.bool(e.loaded);
            w.bool(e.should_be_loaded);
        }
        Payload::Host(e) => {
            w.u32(e.host_id);
            w.u32(e.instance_id);
            w.string(&e.name);
            w.string(&e.alias);
            w.string(&e.address);
            w.string(&e.display_name);
            w.bool(e.enabled);
            w.string(&e.check_command);
            w.f64(e.check_interval);
            w.f64(e.retry_interval);
            w.i32(e.max_check_attempts);
            w.string(&e.check_period);
            w.bool(e.active_checks_enabled);
            w.bool(e.passive_checks_enabled);
            w.bool(e.check_freshness);
            w.f64(e.freshness_threshold);
            w.string(&e.event_handler);
            w.bool(e.event_handler_enabled);
            w.bool(e.flap_detection_enabled);
            w.f64(e.low_flap_threshold);
            w.f64(e.high_flap_threshold);
            w.bool(e.obsess_over);
            w.f64(e.notification_interval);
            w.string(&e.notification_period);
            w.bool(e.notifications_enabled);
            w.string(&e.notes);
            w.string(&e.notes_url);
            w.string(&e.action_url);
            w.string(&e.icon_image);
        }
        Payload::Service(e) => {
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.string(&e.description);
            w.string(&e.display_name);
            w.bool(e.enabled);
            w.string(&e.check_command);
            w.f64(e.check_interval);
            w.f64(e.retry_interval);
            w.i32(e.max_check_attempts);
            w.string(&e.check_period);
            w.bool(e.active_checks_enabled);
            w.bool(e.passive_checks_enabled);
            w.bool(e.check_freshness);
            w.f64(e.freshness_threshold);
            w.string(&e.event_handler);
            w.bool(e.event_handler_enabled);
            w.bool(e.flap_detection_enabled);
            w.f64(e.low_flap_threshold);
            w.f64(e.high_flap_threshold);
            w.bool(e.is_volatile);
            w.bool(e.obsess_over);
            w.f64(e.notification_interval);
            w.string(&e.notification_period);
            w.bool(e.notifications_enabled);
            w.string(&e.notes);
            w.string(&e.notes_url);
            w.string(&e.action_url);
            w.string(&e.icon_image);
        }
        Payload::HostCheck(e) => {
            w.u32(e.host_id);
            w.string(&e.command_line);
            w.i16(e.check_type);
            w.bool(e.active_checks_enabled);
            w.i64(e.next_check);
        }
        Payload::ServiceCheck(e) => {
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.string(&e.command_line);
            w.i16(e.check_type);
            w.bool(e.active_checks_enabled);
            w.i64(e.next_check);
        }
        Payload::HostStatus(e) => {
            w.u32(e.host_id);
            w.bool(e.checked);
            w.i16(e.check_type);
            w.i16(e.current_state);
            w.i16(e.state_type);
            w.i16(e.current_check_attempt);
            w.i64(e.last_check);
            w.i64(e.next_check);
            w.i64(e.last_state_change);
            w.i16(e.last_hard_state);
            w.i64(e.last_hard_state_change);
            w.i64(e.last_time_up);
            w.i64(e.last_time_down);
            w.i64(e.last_time_unreachable);
            w.string(&e.output);
            w.string(&e.perfdata);
            w.bool(e.flapping);
            w.f64(e.percent_state_change);
            w.f64(e.latency);
            w.f64(e.execution_time);
            w.bool(e.acknowledged);
            w.i16(e.acknowledgement_type);
            w.i16(e.scheduled_downtime_depth);
            w.bool(e.should_be_scheduled);
            w.i16(e.notification_number);
            w.i64(e.last_notification);
            w.i64(e.next_notification);
            w.bool(e.no_more_notifications);
        }
        Payload::ServiceStatus(e) => {
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.bool(e.checked);
            w.i16(e.check_type);
            w.i16(e.current_state);
            w.i16(e.state_type);
            w.i16(e.current_check_attempt);
            w.i64(e.last_check);
            w.i64(e.next_check);
            w.f64(e.check_interval);
            w.i64(e.last_state_change);
            w.i16(e.last_hard_state);
            w.i64(e.last_hard_state_change);
            w.i64(e.last_time_ok);
            w.i64(e.last_time_warning);
            w.i64(e.last_time_critical);
            w.i64(e.last_time_unknown);
            w.string(&e.output);
            w.string(&e.perfdata);
            w.bool(e.flapping);
            w.f64(e.percent_state_change);
            w.f64(e.latency);
            w.f64(e.execution_time);
            w.bool(e.acknowledged);
            w.i16(e.acknowledgement_type);
            w.i16(e.scheduled_downtime_depth);
            w.bool(e.should_be_scheduled);
            w.i16(e.notification_number);
            w.i64(e.last_notification);
            w.i64(e.next_notification);
            w.bool(e.no_more_notifications);
        }
        Payload::Comment(e) => {
            w.u32(e.instance_id);
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.u32(e.internal_id);
            w.string(&e.author);
            w.string(&e.data);
            w.i16(e.comment_type);
            w.i16(e.entry_type);
            w.i64(e.entry_time);
            w.i64(e.deletion_time);
            w.i64(e.expire_time);
            w.bool(e.expires);
            w.bool(e.persistent);
            w.i16(e.source);
        }
        Payload::Downtime(e) => {
            w.u32(e.instance_id);
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.u32(e.internal_id);
            w.string(&e.author);
            w.string(&e.comment);
            w.i16(e.downtime_type);
            w.i64(e.entry_time);
            w.i64(e.start_time);
            w.i64(e.end_time);
            w.i64(e.actual_start_time);
            w.i64(e.actual_end_time);
            w.i64(e.duration);
            w.u32(e.triggered_by);
            w.bool(e.fixed);
            w.bool(e.started);
            w.bool(e.cancelled);
            w.i64(e.deletion_time);
        }
        Payload::Acknowledgement(e) => {
            w.u32(e.instance_id);
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.string(&e.author);
            w.string(&e.comment);
            w.i64(e.entry_time);
            w.i64(e.deletion_time);
            w.i16(e.acknowledgement_type);
            w.i16(e.state);
            w.bool(e.is_sticky);
            w.bool(e.notify_contacts);
            w.bool(e.persistent_comment);
        }
        Payload::CustomVariable(e) => {
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.string(&e.name);
            w.string(&e.value);
            w.string(&e.default_value);
            w.i16(e.var_type);
            w.bool(e.modified);
            w.i64(e.update_time);
            w.bool(e.enabled);
        }
        Payload::CustomVariableStatus(e) => {
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.string(&e.name);
            w.string(&e.value);
            w.bool(e.modified);
            w.i64(e.update_time);
        }
        Payload::LogEntry(e) => {
            w.i64(e.ctime);
            w.string(&e.instance_name);
            w.u32(e.host_id);
            w.string(&e.host_name);
            w.u32(e.service_id);
            w.string(&e.service_description);
            w.string(&e.output);
            w.i16(e.status);
            w.i16(e.msg_type);
            w.i32(e.retry);
            w.string(&e.notification_cmd);
            w.string(&e.notification_contact);
        }
        Payload::HostParent(e) => {
            w.u32(e.child_id);
            w.u32(e.parent_id);
            w.bool(e.enabled);
        }
        Payload::HostDependency(e) => {
            w.u32(e.host_id);
            w.u32(e.dependent_host_id);
            w.string(&e.dependency_period);
            w.string(&e.execution_failure_options);
            w.string(&e.notification_failure_options);
            w.bool(e.inherits_parent);
            w.bool(e.enabled);
        }
        Payload::ServiceDependency(e) => {
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.u32(e.dependent_host_id);
            w.u32(e.dependent_service_id);
            w.string(&e.dependency_period);
            w.string(&e.execution_failure_options);
            w.string(&e.notification_failure_options);
            w.bool(e.inherits_parent);
            w.bool(e.enabled);
        }
        Payload::HostGroup(e) => {
            w.u32(e.hostgroup_id);
            w.u32(e.instance_id);
            w.string(&e.name);
            w.bool(e.enabled);
        }
        Payload::HostGroupMember(e) => {
            w.u32(e.hostgroup_id);
            w.u32(e.instance_id);
            w.u32(e.host_id);
            w.bool(e.enabled);
        }
        Payload::ServiceGroup(e) => {
            w.u32(e.servicegroup_id);
            w.u32(e.instance_id);
            w.string(&e.name);
            w.bool(e.enabled);
        }
        Payload::ServiceGroupMember(e) => {
            w.u32(e.servicegroup_id);
            w.u32(e.instance_id);
            w.u32(e.host_id);
            w.u32(e.service_id);
            w.bool(e.enabled);
        }
        Payload::Metric(e) => {
            w.i64(e.time);
            w.u32(e.interval);
            w.u64(e.metric_id);
            w.string(&e.name);
            w.i32(e.rrd_len);
            w.f64(e.value);
            w.i16(e.value_type);
            w.u32(e.host_id);
            w.u32(e.service_id);
        }
        Payload::PerfStatus(e) => {
            w.i64(e.time);
            w.u64(e.index_id);
            w.u32(e.interval);
            w.i32(e.rrd_len);
            w.i16(e.state);
        }
        Payload::IndexMapping(e) => {
            w.u64(e.index_id);
            w.u32(e.host_id);
            w.u32(e.service_id);
        }
        Payload::MetricMapping(e) => {
            w.u64(e.index_id);
            w.u64(e.metric_id);
        }
        Payload::Rebuild(e) => {
            w.u64(e.id);
            w.bool(e.is_index);
            w.bool(e.end);
        }
        Payload::RemoveGraph(e) => {
            w.u64(e.id);
            w.bool(e.is_index);
        }
        Payload::VersionResponse(e) => {
            w.u16(e.major);
            w.u16(e.minor);
            w.u16(e.patch);
            w.string(&e.extensions);
        }
        Payload::Ack(e) => {
            w.u32(e.acknowledged_events);
        }
        Payload::AdaptiveHost(_)
        | Payload::AdaptiveService(_)
        | Payload::Severity(_)
        | Payload::Tag(_) => {
            return Err(CodecError::Unrepresentable {
                kind: payload.kind(),
                codec: "legacy",
            });
        }
    }
    Ok(())
}
