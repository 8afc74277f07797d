use crate::registry::{types, Category, Codec, EventType, Registry};

#[test]
fn test_type_id_partition() {
    assert_eq!(types::HOST.0, (1 << 16) | 12);
    assert_eq!(types::HOST.category(), Some(Category::Neb));
    assert_eq!(types::HOST.element(), 12);

    assert_eq!(types::ACK.category(), Some(Category::Bbdo));
    assert_eq!(types::METRIC.category(), Some(Category::Storage));
    assert_eq!(EventType(0x7F00_0001).category(), None);
}

#[test]
fn test_display() {
    assert_eq!(types::HOST.to_string(), "neb:12");
    assert_eq!(types::VERSION_RESPONSE.to_string(), "bbdo:1");
    assert_eq!(EventType(0xDEAD_0001).to_string(), "unknown:0xdead0001");
}

#[test]
fn test_bootstrap_is_complete() {
    let registry = Registry::bootstrap();
    assert!(!registry.is_empty());

    // Every legacy/proto pair decodes to the same payload kind.
    let host = registry.get(types::HOST).unwrap();
    let pb_host = registry.get(types::PB_HOST).unwrap();
    assert_eq!(host.name, "host");
    assert_eq!(pb_host.name, "pb_host");
    assert_eq!(host.codec, Codec::Legacy);
    assert_eq!(pb_host.codec, Codec::Proto);
    assert_eq!(host.table, pb_host.table);
}

#[test]
fn test_unknown_type_is_absent_not_fatal() {
    let registry = Registry::bootstrap();
    assert!(registry.get(EventType(0x0001_FFFF)).is_none());
    assert!(!registry.contains(EventType(0x0009_0001)));
}

#[test]
fn test_every_entry_decodes_empty_proto_payload() {
    // Proto decoding of an empty buffer yields the all-default payload.
    let registry = Registry::bootstrap();
    for id in registry.type_ids() {
        let info = registry.get(id).unwrap();
        if info.codec == Codec::Proto {
            let payload = info.decode(&[]).unwrap();
            assert_eq!(info.name.trim_start_matches("pb_"), payload.kind());
        }
    }
}
