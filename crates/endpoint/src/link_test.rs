use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;

use vigil_protocol::{
    encode_frame, types, Event, EventType, Instance, Payload, Registry, VersionResponse,
};

use crate::error::EndpointError;
use crate::link::{BbdoLink, LinkConfig};
use crate::transport::BoxedTransport;

fn registry() -> Arc<Registry> {
    Arc::new(Registry::bootstrap())
}

fn pair() -> (BoxedTransport, BoxedTransport) {
    let (a, b) = tokio::io::duplex(256 * 1024);
    (Box::new(a), Box::new(b))
}

fn instance_event(id: u32) -> Event {
    Event::new(
        types::INSTANCE,
        Payload::Instance(Instance {
            instance_id: id,
            name: "p1".into(),
            running: true,
            start_time: 1000,
            end_time: 0,
            pid: 9,
            version: "24.04".into(),
        }),
    )
}

#[tokio::test]
async fn test_negotiation_succeeds_between_peers() {
    let (a, b) = pair();
    let mut left = BbdoLink::new(a, registry(), LinkConfig::default());
    let mut right = BbdoLink::new(b, registry(), LinkConfig::default());

    let (l, r) = tokio::join!(left.negotiate(), right.negotiate());
    let l = l.unwrap();
    let r = r.unwrap();
    assert_eq!(l.major, vigil_protocol::VERSION_MAJOR);
    assert_eq!(l.minor, r.minor);
}

#[tokio::test]
async fn test_negotiation_rejects_major_mismatch() {
    let (a, b) = pair();
    let mut link = BbdoLink::new(a, registry(), LinkConfig::default());

    // Hand-craft a peer speaking a newer major.
    let reg = registry();
    let hello = Event::new(
        types::VERSION_RESPONSE,
        Payload::VersionResponse(VersionResponse {
            major: vigil_protocol::VERSION_MAJOR + 1,
            minor: 0,
            patch: 0,
            extensions: String::new(),
        }),
    );
    let payload = hello.encode_payload(&reg).unwrap();
    let mut frame = BytesMut::new();
    encode_frame(types::VERSION_RESPONSE, 0, 0, &payload, &mut frame);

    let mut peer = b;
    let writer = async move {
        peer.write_all(&frame).await.unwrap();
        peer
    };
    let (result, _peer) = tokio::join!(link.negotiate(), writer);
    assert!(matches!(
        result,
        Err(EndpointError::PeerIncompatible { peer, .. }) if peer == vigil_protocol::VERSION_MAJOR + 1
    ));
}

#[tokio::test]
async fn test_negotiation_rejects_data_before_handshake() {
    let (a, b) = pair();
    let mut link = BbdoLink::new(a, registry(), LinkConfig::default());

    let reg = registry();
    let event = instance_event(1);
    let payload = event.encode_payload(&reg).unwrap();
    let mut frame = BytesMut::new();
    encode_frame(types::INSTANCE, 0, 0, &payload, &mut frame);

    let mut peer = b;
    let writer = async move {
        peer.write_all(&frame).await.unwrap();
        peer
    };
    let (result, _peer) = tokio::join!(link.negotiate(), writer);
    assert!(matches!(
        result,
        Err(EndpointError::NegotiationProtocol { .. })
    ));
}

#[tokio::test]
async fn test_events_flow_after_split() {
    let (a, b) = pair();
    let mut left = BbdoLink::new(a, registry(), LinkConfig::default());
    let mut right = BbdoLink::new(b, registry(), LinkConfig::default());
    let (l, r) = tokio::join!(left.negotiate(), right.negotiate());
    l.unwrap();
    r.unwrap();

    let (_l_reader, mut l_writer) = left.split();
    let (mut r_reader, _r_writer) = right.split();

    for id in 0..5 {
        l_writer.write_event(&instance_event(id)).await.unwrap();
    }
    for id in 0..5 {
        let event = r_reader
            .read_event(Duration::from_secs(1))
            .await
            .unwrap()
            .expect("event expected");
        match event.payload {
            Payload::Instance(i) => assert_eq!(i.instance_id, id),
            other => panic!("unexpected payload {}", other.kind()),
        }
        r_reader.note_consumed();
    }
    assert_eq!(r_reader.take_consumed(), 5);
    assert_eq!(r_reader.take_consumed(), 0);
}

#[tokio::test]
async fn test_ack_roundtrip() {
    let (a, b) = pair();
    let mut left = BbdoLink::new(a, registry(), LinkConfig::default());
    let mut right = BbdoLink::new(b, registry(), LinkConfig::default());
    let (l, r) = tokio::join!(left.negotiate(), right.negotiate());
    l.unwrap();
    r.unwrap();

    let (mut l_reader, _l_writer) = left.split();
    let (_r_reader, mut r_writer) = right.split();

    r_writer.send_ack(42).await.unwrap();
    let event = l_reader
        .read_event(Duration::from_secs(1))
        .await
        .unwrap()
        .expect("ack expected");
    match event.payload {
        Payload::Ack(ack) => assert_eq!(ack.acknowledged_events, 42),
        other => panic!("unexpected payload {}", other.kind()),
    }

    // A zero ack is suppressed entirely.
    r_writer.send_ack(0).await.unwrap();
    assert!(l_reader
        .read_event(Duration::from_millis(20))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unknown_type_is_skipped_not_fatal() {
    let (a, b) = pair();
    let mut left = BbdoLink::new(a, registry(), LinkConfig::default());
    let mut right = BbdoLink::new(b, registry(), LinkConfig::default());
    let (l, r) = tokio::join!(left.negotiate(), right.negotiate());
    l.unwrap();
    r.unwrap();

    let (mut l_reader, _l_writer) = left.split();
    let (r_read_half, mut r_writer) = right.split();
    drop(r_read_half);

    // Raw frame with an unregistered type id, then a real event.
    let mut raw = BytesMut::new();
    encode_frame(EventType(0x0001_FFFF), 0, 0, b"\x01\x02\x03", &mut raw);
    r_writer.write_raw(&raw).await.unwrap();
    r_writer.write_event(&instance_event(7)).await.unwrap();

    let event = l_reader
        .read_event(Duration::from_secs(1))
        .await
        .unwrap()
        .expect("the frame after the unknown one");
    assert!(matches!(event.payload, Payload::Instance(i) if i.instance_id == 7));
    assert_eq!(l_reader.unknown_type_count(), 1);
}

#[tokio::test]
async fn test_read_event_times_out_quietly() {
    let (a, b) = pair();
    let mut left = BbdoLink::new(a, registry(), LinkConfig::default());
    let mut right = BbdoLink::new(b, registry(), LinkConfig::default());
    let (l, r) = tokio::join!(left.negotiate(), right.negotiate());
    l.unwrap();
    r.unwrap();

    let (mut l_reader, _l_writer) = left.split();
    let (_r_reader, _r_writer) = right.split();

    let got = l_reader.read_event(Duration::from_millis(20)).await.unwrap();
    assert!(got.is_none());
}
