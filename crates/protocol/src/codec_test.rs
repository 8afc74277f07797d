use crate::events::*;
use crate::registry::{types, Event, Registry};
use crate::CodecError;

fn roundtrip(registry: &Registry, event: Event) {
    let encoded = event.encode_payload(registry).unwrap();
    let info = registry.get(event.type_id).unwrap();
    let decoded = info.decode(&encoded).unwrap();
    assert_eq!(decoded, event.payload, "roundtrip failed for {}", info.name);
}

fn sample_host() -> Host {
    Host {
        host_id: 42,
        instance_id: 1,
        name: "web-01".into(),
        alias: "frontal".into(),
        address: "10.1.2.3".into(),
        display_name: "web-01".into(),
        enabled: true,
        check_command: "check_icmp -H 10.1.2.3".into(),
        check_interval: 5.0,
        retry_interval: 1.0,
        max_check_attempts: 3,
        check_period: "24x7".into(),
        active_checks_enabled: true,
        passive_checks_enabled: false,
        check_freshness: false,
        freshness_threshold: 0.0,
        event_handler: String::new(),
        event_handler_enabled: false,
        flap_detection_enabled: true,
        low_flap_threshold: 20.0,
        high_flap_threshold: 50.0,
        obsess_over: false,
        notification_interval: 30.0,
        notification_period: "24x7".into(),
        notifications_enabled: true,
        notes: String::new(),
        notes_url: String::new(),
        action_url: String::new(),
        icon_image: String::new(),
        severity_id: 0,
        tags: Vec::new(),
    }
}

fn sample_service_status() -> ServiceStatus {
    ServiceStatus {
        host_id: 42,
        service_id: 7,
        checked: true,
        check_type: 0,
        current_state: 1,
        state_type: 1,
        current_check_attempt: 2,
        last_check: 1100,
        next_check: 1160,
        check_interval: 1.0,
        last_state_change: 1050,
        last_hard_state: 0,
        last_hard_state_change: 900,
        last_time_ok: 1040,
        last_time_warning: 1100,
        last_time_critical: 0,
        last_time_unknown: 0,
        output: "WARNING - load high".into(),
        perfdata: "load=0.42;1;2;0;4".into(),
        flapping: false,
        percent_state_change: 6.25,
        latency: 0.12,
        execution_time: 0.6,
        acknowledged: false,
        acknowledgement_type: 0,
        scheduled_downtime_depth: 0,
        should_be_scheduled: true,
        notification_number: 0,
        last_notification: 0,
        next_notification: 0,
        no_more_notifications: false,
    }
}

#[test]
fn test_legacy_roundtrip_lifecycle_events() {
    let registry = Registry::bootstrap();

    let instance = Instance {
        instance_id: 1,
        name: "central".into(),
        running: true,
        start_time: 1000,
        end_time: 0,
        pid: 4242,
        version: "24.04".into(),
    };
    roundtrip(&registry, Event::new(types::INSTANCE, Payload::Instance(instance)));

    roundtrip(
        &registry,
        Event::new(types::HOST, Payload::Host(sample_host())),
    );

    roundtrip(
        &registry,
        Event::new(
            types::SERVICE_STATUS,
            Payload::ServiceStatus(sample_service_status()),
        ),
    );

    let downtime = Downtime {
        instance_id: 1,
        host_id: 42,
        service_id: 0,
        internal_id: 12,
        author: "admin".into(),
        comment: "maintenance".into(),
        downtime_type: 2,
        entry_time: 5000,
        start_time: 5100,
        end_time: 5400,
        actual_start_time: 5100,
        actual_end_time: 0,
        duration: 300,
        triggered_by: 0,
        fixed: true,
        started: true,
        cancelled: false,
        deletion_time: 0,
    };
    roundtrip(&registry, Event::new(types::DOWNTIME, Payload::Downtime(downtime)));
}

#[test]
fn test_legacy_roundtrip_every_registered_type() {
    // Defaults exercise the empty-string and zero paths of every field codec.
    let registry = Registry::bootstrap();
    let defaults: Vec<Event> = vec![
        Event::new(types::ACKNOWLEDGEMENT, Payload::Acknowledgement(Default::default())),
        Event::new(types::COMMENT, Payload::Comment(Default::default())),
        Event::new(types::CUSTOM_VARIABLE, Payload::CustomVariable(Default::default())),
        Event::new(types::CUSTOM_VARIABLE_STATUS, Payload::CustomVariableStatus(Default::default())),
        Event::new(types::DOWNTIME, Payload::Downtime(Default::default())),
        Event::new(types::HOST_CHECK, Payload::HostCheck(Default::default())),
        Event::new(types::HOST_DEPENDENCY, Payload::HostDependency(Default::default())),
        Event::new(types::HOST_GROUP, Payload::HostGroup(Default::default())),
        Event::new(types::HOST_GROUP_MEMBER, Payload::HostGroupMember(Default::default())),
        Event::new(types::HOST, Payload::Host(Default::default())),
        Event::new(types::HOST_PARENT, Payload::HostParent(Default::default())),
        Event::new(types::HOST_STATUS, Payload::HostStatus(Default::default())),
        Event::new(types::INSTANCE, Payload::Instance(Default::default())),
        Event::new(types::INSTANCE_STATUS, Payload::InstanceStatus(Default::default())),
        Event::new(types::LOG_ENTRY, Payload::LogEntry(Default::default())),
        Event::new(types::MODULE, Payload::Module(Default::default())),
        Event::new(types::SERVICE_CHECK, Payload::ServiceCheck(Default::default())),
        Event::new(types::SERVICE_DEPENDENCY, Payload::ServiceDependency(Default::default())),
        Event::new(types::SERVICE_GROUP, Payload::ServiceGroup(Default::default())),
        Event::new(types::SERVICE_GROUP_MEMBER, Payload::ServiceGroupMember(Default::default())),
        Event::new(types::SERVICE, Payload::Service(Default::default())),
        Event::new(types::SERVICE_STATUS, Payload::ServiceStatus(Default::default())),
        Event::new(types::METRIC, Payload::Metric(Default::default())),
        Event::new(types::REBUILD, Payload::Rebuild(Default::default())),
        Event::new(types::REMOVE_GRAPH, Payload::RemoveGraph(Default::default())),
        Event::new(types::STATUS, Payload::PerfStatus(Default::default())),
        Event::new(types::INDEX_MAPPING, Payload::IndexMapping(Default::default())),
        Event::new(types::METRIC_MAPPING, Payload::MetricMapping(Default::default())),
        Event::new(types::VERSION_RESPONSE, Payload::VersionResponse(Default::default())),
        Event::new(types::ACK, Payload::Ack(Default::default())),
    ];
    for event in defaults {
        roundtrip(&registry, event);
    }
}

#[test]
fn test_proto_roundtrip_host_with_tags() {
    let registry = Registry::bootstrap();
    let mut host = sample_host();
    host.severity_id = 3;
    host.tags = vec![
        TagRef { id: 10, kind: TagKind::HostGroup },
        TagRef { id: 11, kind: TagKind::HostCategory },
    ];
    roundtrip(&registry, Event::new(types::PB_HOST, Payload::Host(host)));
}

#[test]
fn test_proto_roundtrip_service_status() {
    let registry = Registry::bootstrap();
    roundtrip(
        &registry,
        Event::new(
            types::PB_SERVICE_STATUS,
            Payload::ServiceStatus(sample_service_status()),
        ),
    );
}

#[test]
fn test_proto_roundtrip_referentials() {
    let registry = Registry::bootstrap();

    let severity = Severity {
        action: RefAction::Add,
        id: 5,
        severity_type: 1,
        level: 2,
        icon_id: 33,
        name: "critical-ish".into(),
        instance_id: 1,
    };
    roundtrip(&registry, Event::new(types::PB_SEVERITY, Payload::Severity(severity)));

    let tag = Tag {
        action: RefAction::Delete,
        id: 9,
        kind: TagKind::ServiceCategory,
        name: "databases".into(),
        instance_id: 1,
    };
    roundtrip(&registry, Event::new(types::PB_TAG, Payload::Tag(tag)));
}

#[test]
fn test_proto_adaptive_preserves_explicit_defaults() {
    // Some(false) and Some(0.0) must survive; that is the whole point of the
    // partial-update events.
    let registry = Registry::bootstrap();
    let adaptive = AdaptiveService {
        host_id: 42,
        service_id: 7,
        notifications_enabled: Some(false),
        check_interval: Some(0.0),
        max_check_attempts: None,
        ..Default::default()
    };
    roundtrip(
        &registry,
        Event::new(types::PB_ADAPTIVE_SERVICE, Payload::AdaptiveService(adaptive)),
    );
}

#[test]
fn test_proto_skips_unknown_fields() {
    let registry = Registry::bootstrap();
    let event = Event::new(
        types::PB_INSTANCE,
        Payload::Instance(Instance {
            instance_id: 1,
            name: "p1".into(),
            running: true,
            start_time: 1000,
            end_time: 0,
            pid: 0,
            version: String::new(),
        }),
    );
    let mut encoded = event.encode_payload(&registry).unwrap();

    // Append an unknown varint field (number 200) as a newer peer would.
    encoded.extend_from_slice(&[0xC0, 0x0C, 0x2A]);

    let info = registry.get(types::PB_INSTANCE).unwrap();
    let decoded = info.decode(&encoded).unwrap();
    assert_eq!(decoded, event.payload);
}

#[test]
fn test_legacy_cannot_encode_proto_only_events() {
    let registry = Registry::bootstrap();
    // Force a proto-only payload through a legacy id: must refuse.
    let event = Event::new(types::HOST, Payload::Severity(Severity::default()));
    assert!(matches!(
        event.encode_payload(&registry),
        Err(CodecError::Unrepresentable { .. })
    ));
}

#[test]
fn test_legacy_truncated_payload() {
    let registry = Registry::bootstrap();
    let event = Event::new(types::INSTANCE, Payload::Instance(Instance {
        instance_id: 9,
        name: "p9".into(),
        running: true,
        start_time: 77,
        end_time: 0,
        pid: 1,
        version: "1.0".into(),
    }));
    let encoded = event.encode_payload(&registry).unwrap();

    let info = registry.get(types::INSTANCE).unwrap();
    let err = info.decode(&encoded[..encoded.len() / 2]).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Truncated { .. } | CodecError::UnterminatedString(_)
    ));
}
