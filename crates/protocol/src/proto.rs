//! Protobuf payload codec
//!
//! Hand-written protobuf wire format, no code generation. Field numbers
//! follow struct declaration order starting at 1; scalar fields are omitted
//! at their proto3 default, optional fields (adaptive events) are written
//! whenever present. Unknown field numbers are skipped, which is what keeps
//! old brokers readable by new ones and vice versa.
//!
//! Wire types used: 0 (varint), 1 (fixed64, doubles), 2 (length-delimited,
//! strings and nested messages). Signed 64-bit timestamps ride as
//! two's-complement varints, the standard proto3 `int64` encoding.

use crate::error::CodecError;
use crate::events::*;
use crate::Result;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

// =============================================================================
// Primitives
// =============================================================================

fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(buf: &mut &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..10 {
        let Some(&byte) = buf.first() else {
            return Err(CodecError::Varint);
        };
        *buf = &buf[1..];
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::Varint)
}

enum Value<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl<'a> Value<'a> {
    fn wire_type(&self) -> u8 {
        match self {
            Self::Varint(_) => WIRE_VARINT,
            Self::Fixed64(_) => WIRE_FIXED64,
            Self::Bytes(_) => WIRE_LEN,
            Self::Fixed32(_) => WIRE_FIXED32,
        }
    }

    fn varint(&self, field: u32) -> Result<u64> {
        match self {
            Self::Varint(v) => Ok(*v),
            other => Err(CodecError::WireType {
                field_number: field,
                wire_type: other.wire_type(),
            }),
        }
    }

    fn as_u32(&self, field: u32) -> Result<u32> {
        Ok(self.varint(field)? as u32)
    }

    fn as_u64(&self, field: u32) -> Result<u64> {
        self.varint(field)
    }

    fn as_i64(&self, field: u32) -> Result<i64> {
        Ok(self.varint(field)? as i64)
    }

    fn as_i32(&self, field: u32) -> Result<i32> {
        Ok(self.varint(field)? as i64 as i32)
    }

    fn as_i16(&self, field: u32) -> Result<i16> {
        Ok(self.varint(field)? as i64 as i16)
    }

    fn as_bool(&self, field: u32) -> Result<bool> {
        Ok(self.varint(field)? != 0)
    }

    fn as_f64(&self, field: u32) -> Result<f64> {
        match self {
            Self::Fixed64(bits) => Ok(f64::from_bits(*bits)),
            other => Err(CodecError::WireType {
                field_number: field,
                wire_type: other.wire_type(),
            }),
        }
    }

    fn as_bytes(&self, field: u32) -> Result<&'a [u8]> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(CodecError::WireType {
                field_number: field,
                wire_type: other.wire_type(),
            }),
        }
    }

    fn as_string(&self, field: u32, name: &'static str) -> Result<String> {
        let bytes = self.as_bytes(field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8(name))
    }
}

struct PbReader<'a> {
    buf: &'a [u8],
}

impl<'a> PbReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Next `(field_number, value)` pair, or `None` at end of payload
    fn next_field(&mut self) -> Result<Option<(u32, Value<'a>)>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let key = read_varint(&mut self.buf)?;
        let field = (key >> 3) as u32;
        let wire = (key & 0x7) as u8;
        let value = match wire {
            WIRE_VARINT => Value::Varint(read_varint(&mut self.buf)?),
            WIRE_FIXED64 => {
                if self.buf.len() < 8 {
                    return Err(CodecError::Truncated {
                        field: "fixed64",
                        needed: 8 - self.buf.len(),
                    });
                }
                let (head, tail) = self.buf.split_at(8);
                self.buf = tail;
                Value::Fixed64(u64::from_le_bytes(head.try_into().unwrap()))
            }
            WIRE_LEN => {
                let len = read_varint(&mut self.buf)? as usize;
                if self.buf.len() < len {
                    return Err(CodecError::Truncated {
                        field: "length-delimited",
                        needed: len - self.buf.len(),
                    });
                }
                let (head, tail) = self.buf.split_at(len);
                self.buf = tail;
                Value::Bytes(head)
            }
            WIRE_FIXED32 => {
                if self.buf.len() < 4 {
                    return Err(CodecError::Truncated {
                        field: "fixed32",
                        needed: 4 - self.buf.len(),
                    });
                }
                let (head, tail) = self.buf.split_at(4);
                self.buf = tail;
                Value::Fixed32(u32::from_le_bytes(head.try_into().unwrap()))
            }
            other => {
                return Err(CodecError::WireType {
                    field_number: field,
                    wire_type: other,
                });
            }
        };
        Ok(Some((field, value)))
    }
}

struct PbWriter<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> PbWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out }
    }

    fn key(&mut self, field: u32, wire: u8) {
        write_varint(self.out, ((field as u64) << 3) | wire as u64);
    }

    fn u32(&mut self, field: u32, v: u32) {
        if v != 0 {
            self.key(field, WIRE_VARINT);
            write_varint(self.out, v as u64);
        }
    }

    fn u64(&mut self, field: u32, v: u64) {
        if v != 0 {
            self.key(field, WIRE_VARINT);
            write_varint(self.out, v);
        }
    }

    fn i64(&mut self, field: u32, v: i64) {
        if v != 0 {
            self.key(field, WIRE_VARINT);
            write_varint(self.out, v as u64);
        }
    }

    fn i32(&mut self, field: u32, v: i32) {
        self.i64(field, v as i64);
    }

    fn i16(&mut self, field: u32, v: i16) {
        self.i64(field, v as i64);
    }

    fn bool(&mut self, field: u32, v: bool) {
        if v {
            self.key(field, WIRE_VARINT);
            write_varint(self.out, 1);
        }
    }

    fn f64(&mut self, field: u32, v: f64) {
        if v != 0.0 {
            self.key(field, WIRE_FIXED64);
            self.out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
    }

    fn string(&mut self, field: u32, v: &str) {
        if !v.is_empty() {
            self.key(field, WIRE_LEN);
            write_varint(self.out, v.len() as u64);
            self.out.extend_from_slice(v.as_bytes());
        }
    }

    fn message(&mut self, field: u32, body: &[u8]) {
        self.key(field, WIRE_LEN);
        write_varint(self.out, body.len() as u64);
        self.out.extend_from_slice(body);
    }

    // Optional fields are written whenever present, defaults included.

    fn opt_bool(&mut self, field: u32, v: Option<bool>) {
        if let Some(v) = v {
            self.key(field, WIRE_VARINT);
            write_varint(self.out, v as u64);
        }
    }

    fn opt_f64(&mut self, field: u32, v: Option<f64>) {
        if let Some(v) = v {
            self.key(field, WIRE_FIXED64);
            self.out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
    }

    fn opt_i32(&mut self, field: u32, v: Option<i32>) {
        if let Some(v) = v {
            self.key(field, WIRE_VARINT);
            write_varint(self.out, v as i64 as u64);
        }
    }

    fn opt_string(&mut self, field: u32, v: Option<&String>) {
        if let Some(v) = v {
            self.key(field, WIRE_LEN);
            write_varint(self.out, v.len() as u64);
            self.out.extend_from_slice(v.as_bytes());
        }
    }
}

// =============================================================================
// Tag references (nested message on host/service events)
// =============================================================================

fn encode_tag_ref(tag: &TagRef, out: &mut Vec<u8>) {
    let mut w = PbWriter::new(out);
    w.u64(1, tag.id);
    w.u32(2, tag.kind.as_u32());
}

fn decode_tag_ref(buf: &[u8]) -> Result<TagRef> {
    let mut r = PbReader::new(buf);
    let mut tag = TagRef::default();
    while let Some((field, value)) = r.next_field()? {
        match field {
            1 => tag.id = value.as_u64(1)?,
            2 => tag.kind = TagKind::from_u32(value.as_u32(2)?),
            _ => {}
        }
    }
    Ok(tag)
}

// =============================================================================
// Decoders (registered in the type table)
// =============================================================================

pub(crate) fn decode_instance(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Instance::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.instance_id = v.as_u32(1)?,
            2 => e.name = v.as_string(2, "name")?,
            3 => e.running = v.as_bool(3)?,
            4 => e.start_time = v.as_i64(4)?,
            5 => e.end_time = v.as_i64(5)?,
            6 => e.pid = v.as_i32(6)?,
            7 => e.version = v.as_string(7, "version")?,
            _ => {}
        }
    }
    Ok(Payload::Instance(e))
}

pub(crate) fn decode_instance_status(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = InstanceStatus::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.instance_id = v.as_u32(1)?,
            2 => e.last_alive = v.as_i64(2)?,
            3 => e.last_command_check = v.as_i64(3)?,
            4 => e.active_host_checks_enabled = v.as_bool(4)?,
            5 => e.active_service_checks_enabled = v.as_bool(5)?,
            6 => e.passive_host_checks_enabled = v.as_bool(6)?,
            7 => e.passive_service_checks_enabled = v.as_bool(7)?,
            8 => e.event_handlers_enabled = v.as_bool(8)?,
            9 => e.flap_detection_enabled = v.as_bool(9)?,
            10 => e.notifications_enabled = v.as_bool(10)?,
            11 => e.obsess_over_hosts = v.as_bool(11)?,
            12 => e.obsess_over_services = v.as_bool(12)?,
            13 => e.global_host_event_handler = v.as_string(13, "global_host_event_handler")?,
            14 => e.global_service_event_handler = v.as_string(14, "global_service_event_handler")?,
            _ => {}
        }
    }
    Ok(Payload::InstanceStatus(e))
}

pub(crate) fn decode_module(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Module::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.instance_id = v.as_u32(1)?,
            2 => e.filename = v.as_string(2, "filename")?,
            3 => e.args = v.as_string(3, "args")?,
            4 => e.enabled = v.as_bool(4)?,
            5 => e.loaded = v.as_bool(5)?,
            6 => e.should_be_loaded = v.as_bool(6)?,
            _ => {}
        }
    }
    Ok(Payload::Module(e))
}

pub(crate) fn decode_host(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Host::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.instance_id = v.as_u32(2)?,
            3 => e.name = v.as_string(3, "name")?,
            4 => e.alias = v.as_string(4, "alias")?,
            5 => e.address = v.as_string(5, "address")?,
            6 => e.display_name = v.as_string(6, "display_name")?,
            7 => e.enabled = v.as_bool(7)?,
            8 => e.check_command = v.as_string(8, "check_command")?,
            9 => e.check_interval = v.as_f64(9)?,
            10 => e.retry_interval = v.as_f64(10)?,
            11 => e.max_check_attempts = v.as_i32(11)?,
            12 => e.check_period = v.as_string(12, "check_period")?,
            13 => e.active_checks_enabled = v.as_bool(13)?,
            14 => e.passive_checks_enabled = v.as_bool(14)?,
            15 => e.check_freshness = v.as_bool(15)?,
            16 => e.freshness_threshold = v.as_f64(16)?,
            17 => e.event_handler = v.as_string(17, "event_handler")?,
            18 => e.event_handler_enabled = v.as_bool(18)?,
            19 => e.flap_detection_enabled = v.as_bool(19)?,
            20 => e.low_flap_threshold = v.as_f64(20)?,
            21 => e.high_flap_threshold = v.as_f64(21)?,
            22 => e.obsess_over = v.as_bool(22)?,
            23 => e.notification_interval = v.as_f64(23)?,
            24 => e.notification_period = v.as_string(24, "notification_period")?,
            25 => e.notifications_enabled = v.as_bool(25)?,
            26 => e.notes = v.as_string(26, "notes")?,
            27 => e.notes_url = v.as_string(27, "notes_url")?,
            28 => e.action_url = v.as_string(28, "action_url")?,
            29 => e.icon_image = v.as_string(29, "icon_image")?,
            30 => e.severity_id = v.as_u64(30)?,
            31 => e.tags.push(decode_tag_ref(v.as_bytes(31)?)?),
            _ => {}
        }
    }
    Ok(Payload::Host(e))
}

pub(crate) fn decode_service(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Service::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.description = v.as_string(3, "description")?,
            4 => e.display_name = v.as_string(4, "display_name")?,
            5 => e.enabled = v.as_bool(5)?,
            6 => e.check_command = v.as_string(6, "check_command")?,
            7 => e.check_interval = v.as_f64(7)?,
            8 => e.retry_interval = v.as_f64(8)?,
            9 => e.max_check_attempts = v.as_i32(9)?,
            10 => e.check_period = v.as_string(10, "check_period")?,
            11 => e.active_checks_enabled = v.as_bool(11)?,
            12 => e.passive_checks_enabled = v.as_bool(12)?,
            13 => e.check_freshness = v.as_bool(13)?,
            14 => e.freshness_threshold = v.as_f64(14)?,
            15 => e.event_handler = v.as_string(15, "event_handler")?,
            16 => e.event_handler_enabled = v.as_bool(16)?,
            17 => e.flap_detection_enabled = v.as_bool(17)?,
            18 => e.low_flap_threshold = v.as_f64(18)?,
            19 => e.high_flap_threshold = v.as_f64(19)?,
            20 => e.is_volatile = v.as_bool(20)?,
            21 => e.obsess_over = v.as_bool(21)?,
            22 => e.notification_interval = v.as_f64(22)?,
            23 => e.notification_period = v.as_string(23, "notification_period")?,
            24 => e.notifications_enabled = v.as_bool(24)?,
            25 => e.notes = v.as_string(25, "notes")?,
            26 => e.notes_url = v.as_string(26, "notes_url")?,
            27 => e.action_url = v.as_string(27, "action_url")?,
            28 => e.icon_image = v.as_string(28, "icon_image")?,
            29 => e.severity_id = v.as_u64(29)?,
            30 => e.tags.push(decode_tag_ref(v.as_bytes(30)?)?),
            _ => {}
        }
    }
    Ok(Payload::Service(e))
}

pub(crate) fn decode_adaptive_host(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = AdaptiveHost::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.notifications_enabled = Some(v.as_bool(2)?),
            3 => e.active_checks_enabled = Some(v.as_bool(3)?),
            4 => e.passive_checks_enabled = Some(v.as_bool(4)?),
            5 => e.event_handler_enabled = Some(v.as_bool(5)?),
            6 => e.flap_detection_enabled = Some(v.as_bool(6)?),
            7 => e.obsess_over = Some(v.as_bool(7)?),
            8 => e.check_freshness = Some(v.as_bool(8)?),
            9 => e.check_interval = Some(v.as_f64(9)?),
            10 => e.retry_interval = Some(v.as_f64(10)?),
            11 => e.max_check_attempts = Some(v.as_i32(11)?),
            12 => e.check_command = Some(v.as_string(12, "check_command")?),
            13 => e.check_period = Some(v.as_string(13, "check_period")?),
            14 => e.event_handler = Some(v.as_string(14, "event_handler")?),
            _ => {}
        }
    }
    Ok(Payload::AdaptiveHost(e))
}

pub(crate) fn decode_adaptive_service(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = AdaptiveService::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.notifications_enabled = Some(v.as_bool(3)?),
            4 => e.active_checks_enabled = Some(v.as_bool(4)?),
            5 => e.passive_checks_enabled = Some(v.as_bool(5)?),
            6 => e.event_handler_enabled = Some(v.as_bool(6)?),
            7 => e.flap_detection_enabled = Some(v.as_bool(7)?),
            8 => e.obsess_over = Some(v.as_bool(8)?),
            9 => e.check_freshness = Some(v.as_bool(9)?),
            10 => e.is_volatile = Some(v.as_bool(10)?),
            11 => e.check_interval = Some(v.as_f64(11)?),
            12 => e.retry_interval = Some(v.as_f64(12)?),
            13 => e.max_check_attempts = Some(v.as_i32(13)?),
            14 => e.check_command = Some(v.as_string(14, "check_command")?),
            15 => e.check_period = Some(v.as_string(15, "check_period")?),
            16 => e.event_handler = Some(v.as_string(16, "event_handler")?),
            _ => {}
        }
    }
    Ok(Payload::AdaptiveService(e))
}

pub(crate) fn decode_host_check(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = HostCheck::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.command_line = v.as_string(2, "command_line")?,
            3 => e.check_type = v.as_i16(3)?,
            4 => e.active_checks_enabled = v.as_bool(4)?,
            5 => e.next_check = v.as_i64(5)?,
            _ => {}
        }
    }
    Ok(Payload::HostCheck(e))
}

pub(crate) fn decode_service_check(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = ServiceCheck::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.command_line = v.as_string(3, "command_line")?,
            4 => e.check_type = v.as_i16(4)?,
            5 => e.active_checks_enabled = v.as_bool(5)?,
            6 => e.next_check = v.as_i64(6)?,
            _ => {}
        }
    }
    Ok(Payload::ServiceCheck(e))
}

pub(crate) fn decode_host_status(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = HostStatus::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.checked = v.as_bool(2)?,
            3 => e.check_type = v.as_i16(3)?,
            4 => e.current_state = v.as_i16(4)?,
            5 => e.state_type = v.as_i16(5)?,
            6 => e.current_check_attempt = v.as_i16(6)?,
            7 => e.last_check = v.as_i64(7)?,
            8 => e.next_check = v.as_i64(8)?,
            9 => e.last_state_change = v.as_i64(9)?,
            10 => e.last_hard_state = v.as_i16(10)?,
            11 => e.last_hard_state_change = v.as_i64(11)?,
            12 => e.last_time_up = v.as_i64(12)?,
            13 => e.last_time_down = v.as_i64(13)?,
            14 => e.last_time_unreachable = v.as_i64(14)?,
            15 => e.output = v.as_string(15, "output")?,
            16 => e.perfdata = v.as_string(16, "perfdata")?,
            17 => e.flapping = v.as_bool(17)?,
            18 => e.percent_state_change = v.as_f64(18)?,
            19 => e.latency = v.as_f64(19)?,
            20 => e.execution_time = v.as_f64(20)?,
            21 => e.acknowledged = v.as_bool(21)?,
            22 => e.acknowledgement_type = v.as_i16(22)?,
            23 => e.scheduled_downtime_depth = v.as_i16(23)?,
            24 => e.should_be_scheduled = v.as_bool(24)?,
            25 => e.notification_number = v.as_i16(25)?,
            26 => e.last_notification = v.as_i64(26)?,
            27 => e.next_notification = v.as_i64(27)?,
            28 => e.no_more_notifications = v.as_bool(28)?,
            _ => {}
        }
    }
    Ok(Payload::HostStatus(e))
}

pub(crate) fn decode_service_status(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = ServiceStatus::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.checked = v.as_bool(3)?,
            4 => e.check_type = v.as_i16(4)?,
            5 => e.current_state = v.as_i16(5)?,
            6 => e.state_type = v.as_i16(6)?,
            7 => e.current_check_attempt = v.as_i16(7)?,
            8 => e.last_check = v.as_i64(8)?,
            9 => e.next_check = v.as_i64(9)?,
            10 => e.check_interval = v.as_f64(10)?,
            11 => e.last_state_change = v.as_i64(11)?,
            12 => e.last_hard_state = v.as_i16(12)?,
            13 => e.last_hard_state_change = v.as_i64(13)?,
            14 => e.last_time_ok = v.as_i64(14)?,
            15 => e.last_time_warning = v.as_i64(15)?,
            16 => e.last_time_critical = v.as_i64(16)?,
            17 => e.last_time_unknown = v.as_i64(17)?,
            18 => e.output = v.as_string(18, "output")?,
            19 => e.perfdata = v.as_string(19, "perfdata")?,
            20 => e.flapping = v.as_bool(20)?,
            21 => e.percent_state_change = v.as_f64(21)?,
            22 => e.latency = v.as_f64(22)?,
            23 => e.execution_time = v.as_f64(23)?,
            24 => e.acknowledged = v.as_bool(24)?,
            25 => e.acknowledgement_type = v.as_i16(25)?,
            26 => e.scheduled_downtime_depth = v.as_i16(26)?,
            27 => e.should_be_scheduled = v.as_bool(27)?,
            28 => e.notification_number = v.as_i16(28)?,
            29 => e.last_notification = v.as_i64(29)?,
            30 => e.next_notification = v.as_i64(30)?,
            31 => e.no_more_notifications = v.as_bool(31)?,
            _ => {}
        }
    }
    Ok(Payload::ServiceStatus(e))
}

pub(crate) fn decode_comment(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Comment::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.instance_id = v.as_u32(1)?,
            2 => e.host_id = v.as_u32(2)?,
            3 => e.service_id = v.as_u32(3)?,
            4 => e.internal_id = v.as_u32(4)?,
            5 => e.author = v.as_string(5, "author")?,
            6 => e.data = v.as_string(6, "data")?,
            7 => e.comment_type = v.as_i16(7)?,
            8 => e.entry_type = v.as_i16(8)?,
            9 => e.entry_time = v.as_i64(9)?,
            10 => e.deletion_time = v.as_i64(10)?,
            11 => e.expire_time = v.as_i64(11)?,
            12 => e.expires = v.as_bool(12)?,
            13 => e.persistent = v.as_bool(13)?,
            14 => e.source = v.as_i16(14)?,
            _ => {}
        }
    }
    Ok(Payload::Comment(e))
}

pub(crate) fn decode_downtime(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Downtime::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.instance_id = v.as_u32(1)?,
            2 => e.host_id = v.as_u32(2)?,
            3 => e.service_id = v.as_u32(3)?,
            4 => e.internal_id = v.as_u32(4)?,
            5 => e.author = v.as_string(5, "author")?,
            6 => e.comment = v.as_string(6, "comment")?,
            7 => e.downtime_type = v.as_i16(7)?,
            8 => e.entry_time = v.as_i64(8)?,
            9 => e.start_time = v.as_i64(9)?,
            10 => e.end_time = v.as_i64(10)?,
            11 => e.actual_start_time = v.as_i64(11)?,
            12 => e.actual_end_time = v.as_i64(12)?,
            13 => e.duration = v.as_i64(13)?,
            14 => e.triggered_by = v.as_u32(14)?,
            15 => e.fixed = v.as_bool(15)?,
            16 => e.started = v.as_bool(16)?,
            17 => e.cancelled = v.as_bool(17)?,
            18 => e.deletion_time = v.as_i64(18)?,
            _ => {}
        }
    }
    Ok(Payload::Downtime(e))
}

pub(crate) fn decode_acknowledgement(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Acknowledgement::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.instance_id = v.as_u32(1)?,
            2 => e.host_id = v.as_u32(2)?,
            3 => e.service_id = v.as_u32(3)?,
            4 => e.author = v.as_string(4, "author")?,
            5 => e.comment = v.as_string(5, "comment")?,
            6 => e.entry_time = v.as_i64(6)?,
            7 => e.deletion_time = v.as_i64(7)?,
            8 => e.acknowledgement_type = v.as_i16(8)?,
            9 => e.state = v.as_i16(9)?,
            10 => e.is_sticky = v.as_bool(10)?,
            11 => e.notify_contacts = v.as_bool(11)?,
            12 => e.persistent_comment = v.as_bool(12)?,
            _ => {}
        }
    }
    Ok(Payload::Acknowledgement(e))
}

pub(crate) fn decode_custom_variable(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = CustomVariable::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.name = v.as_string(3, "name")?,
            4 => e.value = v.as_string(4, "value")?,
            5 => e.default_value = v.as_string(5, "default_value")?,
            6 => e.var_type = v.as_i16(6)?,
            7 => e.modified = v.as_bool(7)?,
            8 => e.update_time = v.as_i64(8)?,
            9 => e.enabled = v.as_bool(9)?,
            _ => {}
        }
    }
    Ok(Payload::CustomVariable(e))
}

pub(crate) fn decode_custom_variable_status(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = CustomVariableStatus::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.name = v.as_string(3, "name")?,
            4 => e.value = v.as_string(4, "value")?,
            5 => e.modified = v.as_bool(5)?,
            6 => e.update_time = v.as_i64(6)?,
            _ => {}
        }
    }
    Ok(Payload::CustomVariableStatus(e))
}

pub(crate) fn decode_log_entry(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = LogEntry::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.ctime = v.as_i64(1)?,
            2 => e.instance_name = v.as_string(2, "instance_name")?,
            3 => e.host_id = v.as_u32(3)?,
            4 => e.host_name = v.as_string(4, "host_name")?,
            5 => e.service_id = v.as_u32(5)?,
            6 => e.service_description = v.as_string(6, "service_description")?,
            7 => e.output = v.as_string(7, "output")?,
            8 => e.status = v.as_i16(8)?,
            9 => e.msg_type = v.as_i16(9)?,
            10 => e.retry = v.as_i32(10)?,
            11 => e.notification_cmd = v.as_string(11, "notification_cmd")?,
            12 => e.notification_contact = v.as_string(12, "notification_contact")?,
            _ => {}
        }
    }
    Ok(Payload::LogEntry(e))
}

pub(crate) fn decode_host_parent(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = HostParent::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.child_id = v.as_u32(1)?,
            2 => e.parent_id = v.as_u32(2)?,
            3 => e.enabled = v.as_bool(3)?,
            _ => {}
        }
    }
    Ok(Payload::HostParent(e))
}

pub(crate) fn decode_host_dependency(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = HostDependency::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.dependent_host_id = v.as_u32(2)?,
            3 => e.dependency_period = v.as_string(3, "dependency_period")?,
            4 => e.execution_failure_options = v.as_string(4, "execution_failure_options")?,
            5 => e.notification_failure_options = v.as_string(5, "notification_failure_options")?,
            6 => e.inherits_parent = v.as_bool(6)?,
            7 => e.enabled = v.as_bool(7)?,
            _ => {}
        }
    }
    Ok(Payload::HostDependency(e))
}

pub(crate) fn decode_service_dependency(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = ServiceDependency::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.host_id = v.as_u32(1)?,
            2 => e.service_id = v.as_u32(2)?,
            3 => e.dependent_host_id = v.as_u32(3)?,
            4 => e.dependent_service_id = v.as_u32(4)?,
            5 => e.dependency_period = v.as_string(5, "dependency_period")?,
            6 => e.execution_failure_options = v.as_string(6, "execution_failure_options")?,
            7 => e.notification_failure_options = v.as_string(7, "notification_failure_options")?,
            8 => e.inherits_parent = v.as_bool(8)?,
            9 => e.enabled = v.as_bool(9)?,
            _ => {}
        }
    }
    Ok(Payload::ServiceDependency(e))
}

pub(crate) fn decode_host_group(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = HostGroup::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.hostgroup_id = v.as_u32(1)?,
            2 => e.instance_id = v.as_u32(2)?,
            3 => e.name = v.as_string(3, "name")?,
            4 => e.enabled = v.as_bool(4)?,
            _ => {}
        }
    }
    Ok(Payload::HostGroup(e))
}

pub(crate) fn decode_host_group_member(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = HostGroupMember::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.hostgroup_id = v.as_u32(1)?,
            2 => e.instance_id = v.as_u32(2)?,
            3 => e.host_id = v.as_u32(3)?,
            4 => e.enabled = v.as_bool(4)?,
            _ => {}
        }
    }
    Ok(Payload::HostGroupMember(e))
}

pub(crate) fn decode_service_group(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = ServiceGroup::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.servicegroup_id = v.as_u32(1)?,
            2 => e.instance_id = v.as_u32(2)?,
            3 => e.name = v.as_string(3, "name")?,
            4 => e.enabled = v.as_bool(4)?,
            _ => {}
        }
    }
    Ok(Payload::ServiceGroup(e))
}

pub(crate) fn decode_service_group_member(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = ServiceGroupMember::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.servicegroup_id = v.as_u32(1)?,
            2 => e.instance_id = v.as_u32(2)?,
            3 => e.host_id = v.as_u32(3)?,
            4 => e.service_id = v.as_u32(4)?,
            5 => e.enabled = v.as_bool(5)?,
            _ => {}
        }
    }
    Ok(Payload::ServiceGroupMember(e))
}

pub(crate) fn decode_severity(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Severity::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.action = RefAction::from_u32(v.as_u32(1)?),
            2 => e.id = v.as_u64(2)?,
            3 => e.severity_type = v.as_u32(3)?,
            4 => e.level = v.as_u32(4)?,
            5 => e.icon_id = v.as_u64(5)?,
            6 => e.name = v.as_string(6, "name")?,
            7 => e.instance_id = v.as_u32(7)?,
            _ => {}
        }
    }
    Ok(Payload::Severity(e))
}

pub(crate) fn decode_tag(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Tag::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.action = RefAction::from_u32(v.as_u32(1)?),
            2 => e.id = v.as_u64(2)?,
            3 => e.kind = TagKind::from_u32(v.as_u32(3)?),
            4 => e.name = v.as_string(4, "name")?,
            5 => e.instance_id = v.as_u32(5)?,
            _ => {}
        }
    }
    Ok(Payload::Tag(e))
}

pub(crate) fn decode_metric(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Metric::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.time = v.as_i64(1)?,
            2 => e.interval = v.as_u32(2)?,
            3 => e.metric_id = v.as_u64(3)?,
            4 => e.name = v.as_string(4, "name")?,
            5 => e.rrd_len = v.as_i32(5)?,
            6 => e.value = v.as_f64(6)?,
            7 => e.value_type = v.as_i16(7)?,
            8 => e.host_id = v.as_u32(8)?,
            9 => e.service_id = v.as_u32(9)?,
            _ => {}
        }
    }
    Ok(Payload::Metric(e))
}

pub(crate) fn decode_status(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = PerfStatus::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.time = v.as_i64(1)?,
            2 => e.index_id = v.as_u64(2)?,
            3 => e.interval = v.as_u32(3)?,
            4 => e.rrd_len = v.as_i32(4)?,
            5 => e.state = v.as_i16(5)?,
            _ => {}
        }
    }
    Ok(Payload::PerfStatus(e))
}

pub(crate) fn decode_index_mapping(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = IndexMapping::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.index_id = v.as_u64(1)?,
            2 => e.host_id = v.as_u32(2)?,
            3 => e.service_id = v.as_u32(3)?,
            _ => {}
        }
    }
    Ok(Payload::IndexMapping(e))
}

pub(crate) fn decode_metric_mapping(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = MetricMapping::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.index_id = v.as_u64(1)?,
            2 => e.metric_id = v.as_u64(2)?,
            _ => {}
        }
    }
    Ok(Payload::MetricMapping(e))
}

pub(crate) fn decode_rebuild(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = Rebuild::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.id = v.as_u64(1)?,
            2 => e.is_index = v.as_bool(2)?,
            3 => e.end = v.as_bool(3)?,
            _ => {}
        }
    }
    Ok(Payload::Rebuild(e))
}

pub(crate) fn decode_remove_graph(buf: &[u8]) -> Result<Payload> {
    let mut r = PbReader::new(buf);
    let mut e = RemoveGraph::default();
    while let Some((field, v)) = r.next_field()? {
        match field {
            1 => e.id = v.as_u64(1)?,
            2 => e.is_index = v.as_bool(2)?,
            _ => {}
        }
    }
    Ok(Payload::RemoveGraph(e))
}

// =============================================================================
// Encoder
// =============================================================================

/// Encode a payload in its protobuf representation
pub(crate) fn encode(payload: &Payload, out: &mut Vec<u8>) -> Result<()> {
    let mut w = PbWriter::new(out);
    match payload {
        Payload::Instance(e) => {
            w.u32(1, e.instance_id);
            w.string(2, &e.name);
            w.bool(3, e.running);
            w.i64(4, e.start_time);
            w.i64(5, e.end_time);
            w.i32(6, e.pid);
            w.string(7, &e.version);
        }
        Payload::InstanceStatus(e) => {
            w.u32(1, e.instance_id);
            w.i64(2, e.last_alive);
            w.i64(3, e.last_command_check);
            w.bool(4, e.active_host_checks_enabled);
            w.bool(5, e.active_service_checks_enabled);
            w.bool(6, e.passive_host_checks_enabled);
            w.bool(7, e.passive_service_checks_enabled);
            w.bool(8, e.event_handlers_enabled);
            w.bool(9, e.flap_detection_enabled);
            w.bool(10, e.notifications_enabled);
            w.bool(11, e.obsess_over_hosts);
            w.bool(12, e.obsess_over_services);
            w.string(13, &e.global_host_event_handler);
            w.string(14, &e.global_service_event_handler);
        }
        Payload::Module(e) => {
            w.u32(1, e.instance_id);
            w.string(2, &e.filename);
            w.string(3, &e.args);
            w.bool(4, e.enabled);
            w.bool(5, e.loaded);
            w.bool(6, e.should_be_loaded);
        }
        Payload::Host(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.instance_id);
            w.string(3, &e.name);
            w.string(4, &e.alias);
            w.string(5, &e.address);
            w.string(6, &e.display_name);
            w.bool(7, e.enabled);
            w.string(8, &e.check_command);
            w.f64(9, e.check_interval);
            w.f64(10, e.retry_interval);
            w.i32(11, e.max_check_attempts);
            w.string(12, &e.check_period);
            w.bool(13, e.active_checks_enabled);
            w.bool(14, e.passive_checks_enabled);
            w.bool(15, e.check_freshness);
            w.f64(16, e.freshness_threshold);
            w.string(17, &e.event_handler);
            w.bool(18, e.event_handler_enabled);
            w.bool(19, e.flap_detection_enabled);
            w.f64(20, e.low_flap_threshold);
            w.f64(21, e.high_flap_threshold);
            w.bool(22, e.obsess_over);
            w.f64(23, e.notification_interval);
            w.string(24, &e.notification_period);
            w.bool(25, e.notifications_enabled);
            w.string(26, &e.notes);
            w.string(27, &e.notes_url);
            w.string(28, &e.action_url);
            w.string(29, &e.icon_image);
            w.u64(30, e.severity_id);
            for tag in &e.tags {
                let mut body = Vec::with_capacity(8);
                encode_tag_ref(tag, &mut body);
                w.message(31, &body);
            }
        }
        Payload::Service(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.string(3, &e.description);
            w.string(4, &e.display_name);
            w.bool(5, e.enabled);
            w.string(6, &e.check_command);
            w.f64(7, e.check_interval);
            w.f64(8, e.retry_interval);
            w.i32(9, e.max_check_attempts);
            w.string(10, &e.check_period);
            w.bool(11, e.active_checks_enabled);
            w.bool(12, e.passive_checks_enabled);
            w.bool(13, e.check_freshness);
            w.f64(14, e.freshness_threshold);
            w.string(15, &e.event_handler);
            w.bool(16, e.event_handler_enabled);
            w.bool(17, e.flap_detection_enabled);
            w.f64(18, e.low_flap_threshold);
            w.f64(19, e.high_flap_threshold);
            w.bool(20, e.is_volatile);
            w.bool(21, e.obsess_over);
            w.f64(22, e.notification_interval);
            w.string(23, &e.notification_period);
            w.bool(24, e.notifications_enabled);
            w.string(25, &e.notes);
            w.string(26, &e.notes_url);
            w.string(27, &e.action_url);
            w.string(28, &e.icon_image);
            w.u64(29, e.severity_id);
            for tag in &e.tags {
                let mut body = Vec::with_capacity(8);
                encode_tag_ref(tag, &mut body);
                w.message(30, &body);
            }
        }
        Payload::AdaptiveHost(e) => {
            w.u32(1, e.host_id);
            w.opt_bool(2, e.notifications_enabled);
            w.opt_bool(3, e.active_checks_enabled);
            w.opt_bool(4, e.passive_checks_enabled);
            w.opt_bool(5, e.event_handler_enabled);
            w.opt_bool(6, e.flap_detection_enabled);
            w.opt_bool(7, e.obsess_over);
            w.opt_bool(8, e.check_freshness);
            w.opt_f64(9, e.check_interval);
            w.opt_f64(10, e.retry_interval);
            w.opt_i32(11, e.max_check_attempts);
            w.opt_string(12, e.check_command.as_ref());
            w.opt_string(13, e.check_period.as_ref());
            w.opt_string(14, e.event_handler.as_ref());
        }
        Payload::AdaptiveService(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.opt_bool(3, e.notifications_enabled);
            w.opt_bool(4, e.active_checks_enabled);
            w.opt_bool(5, e.passive_checks_enabled);
            w.opt_bool(6, e.event_handler_enabled);
            w.opt_bool(7, e.flap_detection_enabled);
            w.opt_bool(8, e.obsess_over);
            w.opt_bool(9, e.check_freshness);
            w.opt_bool(10, e.is_volatile);
            w.opt_f64(11, e.check_interval);
            w.opt_f64(12, e.retry_interval);
            w.opt_i32(13, e.max_check_attempts);
            w.opt_string(14, e.check_command.as_ref());
            w.opt_string(15, e.check_period.as_ref());
            w.opt_string(16, e.event_handler.as_ref());
        }
        Payload::HostCheck(e) => {
            w.u32(1, e.host_id);
            w.string(2, &e.command_line);
            w.i16(3, e.check_type);
            w.bool(4, e.active_checks_enabled);
            w.i64(5, e.next_check);
        }
        Payload::ServiceCheck(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.string(3, &e.command_line);
            w.i16(4, e.check_type);
            w.bool(5, e.active_checks_enabled);
            w.i64(6, e.next_check);
        }
        Payload::HostStatus(e) => {
            w.u32(1, e.host_id);
            w.bool(2, e.checked);
            w.i16(3, e.check_type);
            w.i16(4, e.current_state);
            w.i16(5, e.state_type);
            w.i16(6, e.current_check_attempt);
            w.i64(7, e.last_check);
            w.i64(8, e.next_check);
            w.i64(9, e.last_state_change);
            w.i16(10, e.last_hard_state);
            w.i64(11, e.last_hard_state_change);
            w.i64(12, e.last_time_up);
            w.i64(13, e.last_time_down);
            w.i64(14, e.last_time_unreachable);
            w.string(15, &e.output);
            w.string(16, &e.perfdata);
            w.bool(17, e.flapping);
            w.f64(18, e.percent_state_change);
            w.f64(19, e.latency);
            w.f64(20, e.execution_time);
            w.bool(21, e.acknowledged);
            w.i16(22, e.acknowledgement_type);
            w.i16(23, e.scheduled_downtime_depth);
            w.bool(24, e.should_be_scheduled);
            w.i16(25, e.notification_number);
            w.i64(26, e.last_notification);
            w.i64(27, e.next_notification);
            w.bool(28, e.no_more_notifications);
        }
        Payload::ServiceStatus(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.bool(3, e.checked);
            w.i16(4, e.check_type);
            w.i16(5, e.current_state);
            w.i16(6, e.state_type);
            w.i16(7, e.current_check_attempt);
            w.i64(8, e.last_check);
            w.i64(9, e.next_check);
            w.f64(10, e.check_interval);
            w.i64(11, e.last_state_change);
            w.i16(12, e.last_hard_state);
            w.i64(13, e.last_hard_state_change);
            w.i64(14, e.last_time_ok);
            w.i64(15, e.last_time_warning);
            w.i64(16, e.last_time_critical);
            w.i64(17, e.last_time_unknown);
            w.string(18, &e.output);
            w.string(19, &e.perfdata);
            w.bool(20, e.flapping);
            w.f64(21, e.percent_state_change);
            w.f64(22, e.latency);
            w.f64(23, e.execution_time);
            w.bool(24, e.acknowledged);
            w.i16(25, e.acknowledgement_type);
            w.i16(26, e.scheduled_downtime_depth);
            w.bool(27, e.should_be_scheduled);
            w.i16(28, e.notification_number);
            w.i64(29, e.last_notification);
            w.i64(30, e.next_notification);
            w.bool(31, e.no_more_notifications);
        }
        Payload::Comment(e) => {
            w.u32(1, e.instance_id);
            w.u32(2, e.host_id);
            w.u32(3, e.service_id);
            w.u32(4, e.internal_id);
            w.string(5, &e.author);
            w.string(6, &e.data);
            w.i16(7, e.comment_type);
            w.i16(8, e.entry_type);
            w.i64(9, e.entry_time);
            w.i64(10, e.deletion_time);
            w.i64(11, e.expire_time);
            w.bool(12, e.expires);
            w.bool(13, e.persistent);
            w.i16(14, e.source);
        }
        Payload::Downtime(e) => {
            w.u32(1, e.instance_id);
            w.u32(2, e.host_id);
            w.u32(3, e.service_id);
            w.u32(4, e.internal_id);
            w.string(5, &e.author);
            w.string(6, &e.comment);
            w.i16(7, e.downtime_type);
            w.i64(8, e.entry_time);
            w.i64(9, e.start_time);
            w.i64(10, e.end_time);
            w.i64(11, e.actual_start_time);
            w.i64(12, e.actual_end_time);
            w.i64(13, e.duration);
            w.u32(14, e.triggered_by);
            w.bool(15, e.fixed);
            w.bool(16, e.started);
            w.bool(17, e.cancelled);
            w.i64(18, e.deletion_time);
        }
        Payload::Acknowledgement(e) => {
            w.u32(1, e.instance_id);
            w.u32(2, e.host_id);
            w.u32(3, e.service_id);
            w.string(4, &e.author);
            w.string(5, &e.comment);
            w.i64(6, e.entry_time);
            w.i64(7, e.deletion_time);
            w.i16(8, e.acknowledgement_type);
            w.i16(9, e.state);
            w.bool(10, e.is_sticky);
            w.bool(11, e.notify_contacts);
            w.bool(12, e.persistent_comment);
        }
        Payload::CustomVariable(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.string(3, &e.name);
            w.string(4, &e.value);
            w.string(5, &e.default_value);
            w.i16(6, e.var_type);
            w.bool(7, e.modified);
            w.i64(8, e.update_time);
            w.bool(9, e.enabled);
        }
        Payload::CustomVariableStatus(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.string(3, &e.name);
            w.string(4, &e.value);
            w.bool(5, e.modified);
            w.i64(6, e.update_time);
        }
        Payload::LogEntry(e) => {
            w.i64(1, e.ctime);
            w.string(2, &e.instance_name);
            w.u32(3, e.host_id);
            w.string(4, &e.host_name);
            w.u32(5, e.service_id);
            w.string(6, &e.service_description);
            w.string(7, &e.output);
            w.i16(8, e.status);
            w.i16(9, e.msg_type);
            w.i32(10, e.retry);
            w.string(11, &e.notification_cmd);
            w.string(12, &e.notification_contact);
        }
        Payload::HostParent(e) => {
            w.u32(1, e.child_id);
            w.u32(2, e.parent_id);
            w.bool(3, e.enabled);
        }
        Payload::HostDependency(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.dependent_host_id);
            w.string(3, &e.dependency_period);
            w.string(4, &e.execution_failure_options);
            w.string(5, &e.notification_failure_options);
            w.bool(6, e.inherits_parent);
            w.bool(7, e.enabled);
        }
        Payload::ServiceDependency(e) => {
            w.u32(1, e.host_id);
            w.u32(2, e.service_id);
            w.u32(3, e.dependent_host_id);
            w.u32(4, e.dependent_service_id);
            w.string(5, &e.dependency_period);
            w.string(6, &e.execution_failure_options);
            w.string(7, &e.notification_failure_options);
            w.bool(8, e.inherits_parent);
            w.bool(9, e.enabled);
        }
        Payload::HostGroup(e) => {
            w.u32(1, e.hostgroup_id);
            w.u32(2, e.instance_id);
            w.string(3, &e.name);
            w.bool(4, e.enabled);
        }
        Payload::HostGroupMember(e) => {
            w.u32(1, e.hostgroup_id);
            w.u32(2, e.instance_id);
            w.u32(3, e.host_id);
            w.bool(4, e.enabled);
        }
        Payload::ServiceGroup(e) => {
            w.u32(1, e.servicegroup_id);
            w.u32(2, e.instance_id);
            w.string(3, &e.name);
            w.bool(4, e.enabled);
        }
        Payload::ServiceGroupMember(e) => {
            w.u32(1, e.servicegroup_id);
            w.u32(2, e.instance_id);
            w.u32(3, e.host_id);
            w.u32(4, e.service_id);
            w.bool(5, e.enabled);
        }
        Payload::Severity(e) => {
            w.u32(1, e.action.as_u32());
            w.u64(2, e.id);
            w.u32(3, e.severity_type);
            w.u32(4, e.level);
            w.u64(5, e.icon_id);
            w.string(6, &e.name);
            w.u32(7, e.instance_id);
        }
        Payload::Tag(e) => {
            w.u32(1, e.action.as_u32());
            w.u64(2, e.id);
            w.u32(3, e.kind.as_u32());
            w.string(4, &e.name);
            w.u32(5, e.instance_id);
        }
        Payload::Metric(e) => {
            w.i64(1, e.time);
            w.u32(2, e.interval);
            w.u64(3, e.metric_id);
            w.string(4, &e.name);
            w.i32(5, e.rrd_len);
            w.f64(6, e.value);
            w.i16(7, e.value_type);
            w.u32(8, e.host_id);
            w.u32(9, e.service_id);
        }
        Payload::PerfStatus(e) => {
            w.i64(1, e.time);
            w.u64(2, e.index_id);
            w.u32(3, e.interval);
            w.i32(4, e.rrd_len);
            w.i16(5, e.state);
        }
        Payload::IndexMapping(e) => {
            w.u64(1, e.index_id);
            w.u32(2, e.host_id);
            w.u32(3, e.service_id);
        }
        Payload::MetricMapping(e) => {
            w.u64(1, e.index_id);
            w.u64(2, e.metric_id);
        }
        Payload::Rebuild(e) => {
            w.u64(1, e.id);
            w.bool(2, e.is_index);
            w.bool(3, e.end);
        }
        Payload::RemoveGraph(e) => {
            w.u64(1, e.id);
            w.bool(2, e.is_index);
        }
        Payload::VersionResponse(_) | Payload::Ack(_) => {
            return Err(CodecError::Unrepresentable {
                kind: payload.kind(),
                codec: "proto",
            });
        }
    }
    Ok(())
}
