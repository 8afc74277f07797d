use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vigil_bus::{Engine, Muxer, MuxerOptions, ReadOutcome};
use vigil_protocol::{
    encode_frame, types, Event, EventType, Instance, Metric, Payload, Registry, VersionResponse,
};

use crate::link::{BbdoLink, LinkConfig, LinkReader, LinkWriter};
use crate::transport::{BoxedTransport, DuplexFactory};
use crate::worker::{Endpoint, EndpointConfig, EndpointState};

fn registry() -> Arc<Registry> {
    Arc::new(Registry::bootstrap())
}

fn open_muxer(dir: &Path, name: &str, filter: &[EventType]) -> Arc<Muxer> {
    Arc::new(
        Muxer::open(
            name,
            dir,
            filter.iter().copied().collect::<HashSet<_>>(),
            HashSet::new(),
            registry(),
            MuxerOptions::default(),
        )
        .unwrap(),
    )
}

fn quick_config() -> EndpointConfig {
    EndpointConfig {
        retry_interval: Duration::from_millis(50),
        buffering_timeout: Duration::ZERO,
        link: LinkConfig::default(),
    }
}

fn metric_event(id: u64) -> Event {
    Event::new(
        types::METRIC,
        Payload::Metric(Metric {
            metric_id: id,
            name: "load".into(),
            time: 1000 + id as i64,
            value: 1.0,
            ..Default::default()
        }),
    )
}

fn instance_event(id: u32) -> Event {
    Event::new(
        types::INSTANCE,
        Payload::Instance(Instance {
            instance_id: id,
            name: format!("p{id}"),
            running: true,
            start_time: 1000,
            end_time: 0,
            pid: 1,
            version: "24.04".into(),
        }),
    )
}

async fn peer(transport: BoxedTransport) -> (LinkReader, LinkWriter) {
    let mut link = BbdoLink::new(transport, registry(), LinkConfig::default());
    link.negotiate().await.unwrap();
    link.split()
}

async fn wait_until(mut probe: impl FnMut() -> bool) {
    for _ in 0..200 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_worker_forwards_muxer_events_in_order() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let muxer = open_muxer(dir.path(), "out", &[types::METRIC]);
    engine.register(Arc::clone(&muxer)).unwrap();

    let (a, b) = tokio::io::duplex(256 * 1024);
    let worker = Arc::new(Endpoint::new(
        "rrd-out",
        Box::new(DuplexFactory::new(vec![Box::new(a)])),
        Arc::clone(&muxer),
        Arc::clone(&engine),
        registry(),
        quick_config(),
    ));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&worker).run(cancel.clone()));
    let (mut reader, _writer) = peer(Box::new(b)).await;

    for id in 0..5 {
        engine.publish(&metric_event(id)).unwrap();
    }
    for id in 0..5 {
        let event = reader
            .read_event(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("metric expected");
        assert!(matches!(event.payload, Payload::Metric(m) if m.metric_id == id));
    }

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(worker.status().state, EndpointState::Stopped);
}

#[tokio::test]
async fn test_worker_publishes_inbound_and_acknowledges() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let worker_muxer = open_muxer(dir.path(), "in", &[types::METRIC]);
    let sink = open_muxer(dir.path(), "sink", &[types::INSTANCE]);
    engine.register(Arc::clone(&worker_muxer)).unwrap();
    engine.register(Arc::clone(&sink)).unwrap();

    let (a, b) = tokio::io::duplex(256 * 1024);
    let mut config = quick_config();
    config.link.ack_interval = 2;
    let worker = Arc::new(Endpoint::new(
        "poller-in",
        Box::new(DuplexFactory::new(vec![Box::new(a)])),
        worker_muxer,
        Arc::clone(&engine),
        registry(),
        config,
    ));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&worker).run(cancel.clone()));
    let (mut reader, mut writer) = peer(Box::new(b)).await;

    writer.write_event(&instance_event(1)).await.unwrap();
    writer.write_event(&instance_event(2)).await.unwrap();

    for id in [1u32, 2] {
        match sink.read(Duration::from_secs(2)).await {
            ReadOutcome::Event(event) => {
                assert!(matches!(event.payload, Payload::Instance(i) if i.instance_id == id));
            }
            other => panic!("expected inbound event, got {other:?}"),
        }
    }

    // Two consumed events at ack_interval=2: one ack frame comes back.
    let event = reader
        .read_event(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("ack expected");
    assert!(matches!(event.payload, Payload::Ack(a) if a.acknowledged_events == 2));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_peer_ack_confirms_outbound_events() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let muxer = open_muxer(dir.path(), "out", &[types::METRIC]);
    engine.register(Arc::clone(&muxer)).unwrap();

    let (a, b) = tokio::io::duplex(256 * 1024);
    let worker = Arc::new(Endpoint::new(
        "rrd-out",
        Box::new(DuplexFactory::new(vec![Box::new(a)])),
        Arc::clone(&muxer),
        Arc::clone(&engine),
        registry(),
        quick_config(),
    ));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&worker).run(cancel.clone()));
    let (mut reader, mut writer) = peer(Box::new(b)).await;

    for id in 0..3 {
        engine.publish(&metric_event(id)).unwrap();
    }
    for _ in 0..3 {
        reader.read_event(Duration::from_secs(2)).await.unwrap();
    }
    assert_eq!(muxer.unacknowledged(), 3);

    writer.send_ack(3).await.unwrap();
    wait_until(|| muxer.unacknowledged() == 0).await;

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_version_mismatch_is_terminal() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let muxer = open_muxer(dir.path(), "out", &[types::METRIC]);

    let (a, b) = tokio::io::duplex(64 * 1024);
    let worker = Arc::new(Endpoint::new(
        "central-link",
        Box::new(DuplexFactory::new(vec![Box::new(a)])),
        muxer,
        engine,
        registry(),
        quick_config(),
    ));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&worker).run(cancel.clone()));

    // Peer speaks a newer protocol major.
    let hello = Event::new(
        types::VERSION_RESPONSE,
        Payload::VersionResponse(VersionResponse {
            major: vigil_protocol::VERSION_MAJOR + 1,
            minor: 0,
            patch: 0,
            extensions: String::new(),
        }),
    );
    let payload = hello.encode_payload(&registry()).unwrap();
    let mut frame = BytesMut::new();
    encode_frame(types::VERSION_RESPONSE, 0, 0, &payload, &mut frame);
    let mut peer_half = b;
    tokio::io::AsyncWriteExt::write_all(&mut peer_half, &frame)
        .await
        .unwrap();

    // The worker parks itself without retrying.
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker must exit on its own")
        .unwrap();

    let status = worker.status();
    assert_eq!(status.state, EndpointState::Disconnected);
    assert!(status.last_error.unwrap().contains("bbdo major mismatch"));
}

#[tokio::test]
async fn test_failover_buffers_and_drains_in_order() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());

    let primary_muxer = open_muxer(dir.path(), "primary", &[types::INSTANCE]);
    let failover_muxer = open_muxer(dir.path(), "failover", &[types::INSTANCE]);
    engine.register(Arc::clone(&primary_muxer)).unwrap();

    let failover = Arc::new(Endpoint::new(
        "spill",
        Box::new(DuplexFactory::empty()),
        Arc::clone(&failover_muxer),
        Arc::clone(&engine),
        registry(),
        quick_config(),
    ));

    let factory = Arc::new(DuplexFactory::empty());
    let worker = Arc::new(
        Endpoint::new(
            "central-link",
            Box::new(Arc::clone(&factory)),
            Arc::clone(&primary_muxer),
            Arc::clone(&engine),
            registry(),
            quick_config(),
        )
        .with_failover(Arc::clone(&failover)),
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&worker).run(cancel.clone()));

    // First open fails: the failover muxer takes over the bus.
    wait_until(|| engine.muxer("failover").is_some()).await;

    const BACKLOG: u32 = 1000;
    for id in 0..BACKLOG {
        engine.publish(&instance_event(id)).unwrap();
    }

    // Primary comes back; the backlog must replay before any new event.
    let (a, b) = tokio::io::duplex(1024 * 1024);
    factory.push(Box::new(a)).await;
    let (mut reader, _writer) = peer(Box::new(b)).await;

    for id in 0..BACKLOG {
        let event = reader
            .read_event(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("replayed event expected");
        match event.payload {
            Payload::Instance(i) => assert_eq!(i.instance_id, id, "replay out of order"),
            other => panic!("unexpected payload {}", other.kind()),
        }
    }

    // Failover hands the bus back once drained.
    wait_until(|| engine.muxer("failover").is_none()).await;
    assert_eq!(failover_muxer.stats().queued_events, 0);

    engine.publish(&instance_event(BACKLOG)).unwrap();
    let event = reader
        .read_event(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("post-drain event expected");
    assert!(matches!(event.payload, Payload::Instance(i) if i.instance_id == BACKLOG));

    cancel.cancel();
    handle.await.unwrap();
}
