use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use vigil_protocol::{types, Event, EventType, Metric, Payload, Registry};

use crate::engine::Engine;
use crate::error::BusError;
use crate::muxer::{Muxer, MuxerOptions, ReadOutcome};

fn open_muxer(dir: &std::path::Path, name: &str, filter: HashSet<EventType>) -> Arc<Muxer> {
    Arc::new(
        Muxer::open(
            name,
            dir,
            filter,
            HashSet::new(),
            Arc::new(Registry::bootstrap()),
            MuxerOptions::default(),
        )
        .unwrap(),
    )
}

fn metric_event(metric_id: u64) -> Event {
    Event::new(
        types::METRIC,
        Payload::Metric(Metric {
            metric_id,
            name: "load".into(),
            time: 1000,
            value: 0.5,
            ..Default::default()
        }),
    )
}

fn instance_event() -> Event {
    Event::new(types::INSTANCE, Payload::Instance(Default::default()))
}

#[tokio::test]
async fn test_fanout_respects_each_filter() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new();

    let sql = open_muxer(dir.path(), "sql", HashSet::from([types::INSTANCE]));
    let rrd = open_muxer(dir.path(), "rrd", HashSet::from([types::METRIC]));
    engine.register(Arc::clone(&sql)).unwrap();
    engine.register(Arc::clone(&rrd)).unwrap();

    engine.publish(&instance_event()).unwrap();
    engine.publish(&metric_event(1)).unwrap();
    engine.publish(&metric_event(2)).unwrap();

    // Each subscriber observes exactly its filtered subset, in publish order.
    assert!(matches!(
        sql.read(Duration::from_millis(100)).await,
        ReadOutcome::Event(Event { type_id, .. }) if type_id == types::INSTANCE
    ));
    assert!(matches!(
        sql.read(Duration::from_millis(10)).await,
        ReadOutcome::Timeout
    ));

    for expected in [1u64, 2] {
        match rrd.read(Duration::from_millis(100)).await {
            ReadOutcome::Event(Event {
                payload: Payload::Metric(m),
                ..
            }) => assert_eq!(m.metric_id, expected),
            other => panic!("expected metric, got {other:?}"),
        }
    }

    let stats = engine.stats();
    assert_eq!(stats.published_events, 3);
    assert_eq!(stats.muxer_count, 2);
}

#[test]
fn test_duplicate_registration_is_refused() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let engine = Engine::new();

    engine
        .register(open_muxer(dir_a.path(), "sql", HashSet::new()))
        .unwrap();
    let err = engine
        .register(open_muxer(dir_b.path(), "sql", HashSet::new()))
        .unwrap_err();
    assert!(matches!(err, BusError::DuplicateMuxer(name) if name == "sql"));
}

#[test]
fn test_unregister() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new();
    engine
        .register(open_muxer(dir.path(), "sql", HashSet::new()))
        .unwrap();

    assert!(engine.muxer("sql").is_some());
    assert!(engine.unregister("sql").is_some());
    assert!(engine.muxer("sql").is_none());
    assert!(engine.unregister("sql").is_none());
}

#[test]
fn test_publish_after_shutdown_is_refused() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new();
    engine
        .register(open_muxer(dir.path(), "sql", HashSet::from([types::INSTANCE])))
        .unwrap();

    engine.shutdown();
    assert!(matches!(
        engine.publish(&instance_event()),
        Err(BusError::Stopped)
    ));
    assert_eq!(engine.stats().rejected_events, 1);
}
