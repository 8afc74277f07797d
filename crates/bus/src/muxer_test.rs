use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use vigil_protocol::{types, Event, EventType, Instance, Payload, Registry};
use vigil_spool::SplitterOptions;

use crate::muxer::{Muxer, MuxerOptions, ReadOutcome};

fn instance_event(id: u32) -> Event {
    Event::new(
        types::INSTANCE,
        Payload::Instance(Instance {
            instance_id: id,
            name: format!("poller-{id}"),
            running: true,
            start_time: 1000 + id as i64,
            end_time: 0,
            pid: 1,
            version: "24.04".into(),
        }),
    )
}

fn neb_filter() -> HashSet<EventType> {
    HashSet::from([types::INSTANCE, types::HOST, types::SERVICE_STATUS])
}

fn open_muxer(dir: &Path, cap: usize) -> Muxer {
    Muxer::open(
        "sql",
        dir,
        neb_filter(),
        HashSet::new(),
        Arc::new(Registry::bootstrap()),
        MuxerOptions {
            queue_cap: cap,
            spool: SplitterOptions {
                max_file_size: 4 * 1024,
                auto_delete: true,
            },
            ..Default::default()
        },
    )
    .unwrap()
}

async fn read_event(muxer: &Muxer) -> Event {
    match muxer.read(Duration::from_secs(1)).await {
        ReadOutcome::Event(event) => event,
        other => panic!("expected event, got {other:?}"),
    }
}

fn instance_id(event: &Event) -> u32 {
    match &event.payload {
        Payload::Instance(i) => i.instance_id,
        other => panic!("unexpected payload {}", other.kind()),
    }
}

#[tokio::test]
async fn test_fifo_order() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 100);

    for id in 0..10 {
        muxer.publish(&instance_event(id));
    }
    for id in 0..10 {
        assert_eq!(instance_id(&read_event(&muxer).await), id);
    }
}

#[tokio::test]
async fn test_filter_rejects_unwanted_types() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 100);

    muxer.publish(&Event::new(
        types::METRIC,
        Payload::Metric(Default::default()),
    ));
    muxer.publish(&instance_event(1));

    assert_eq!(instance_id(&read_event(&muxer).await), 1);
    assert!(matches!(
        muxer.read(Duration::from_millis(20)).await,
        ReadOutcome::Timeout
    ));

    let stats = muxer.stats();
    assert_eq!(stats.total_published, 1);
    assert_eq!(stats.filtered_out, 1);
}

#[tokio::test]
async fn test_read_timeout_when_empty() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 100);
    assert!(matches!(
        muxer.read(Duration::from_millis(10)).await,
        ReadOutcome::Timeout
    ));
}

#[tokio::test]
async fn test_ack_drops_oldest() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 100);

    for id in 0..3 {
        muxer.publish(&instance_event(id));
    }
    for _ in 0..3 {
        read_event(&muxer).await;
    }
    assert_eq!(muxer.unacknowledged(), 3);

    muxer.ack(2);
    assert_eq!(muxer.unacknowledged(), 1);
    muxer.ack(1);
    assert_eq!(muxer.unacknowledged(), 0);
}

#[tokio::test]
async fn test_nack_rewinds_unacknowledged() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 100);

    for id in 0..4 {
        muxer.publish(&instance_event(id));
    }
    assert_eq!(instance_id(&read_event(&muxer).await), 0);
    assert_eq!(instance_id(&read_event(&muxer).await), 1);
    muxer.ack(1); // event 0 is gone for good

    muxer.nack(); // event 1 returns to the head

    assert_eq!(instance_id(&read_event(&muxer).await), 1);
    assert_eq!(instance_id(&read_event(&muxer).await), 2);
    assert_eq!(instance_id(&read_event(&muxer).await), 3);
}

#[tokio::test]
async fn test_spill_preserves_order() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 4);

    for id in 0..50 {
        muxer.publish(&instance_event(id));
    }
    let stats = muxer.stats();
    assert!(stats.spilled_events > 0, "cap of 4 must have spilled");

    for id in 0..50 {
        assert_eq!(instance_id(&read_event(&muxer).await), id);
    }

    // Backlog drained: next publishes go back to memory.
    muxer.publish(&instance_event(99));
    assert_eq!(instance_id(&read_event(&muxer).await), 99);
    assert_eq!(muxer.stats().spool_backlog_bytes, 0);
}

#[tokio::test]
async fn test_publish_while_spilling_stays_ordered() {
    let dir = TempDir::new().unwrap();
    let muxer = open_muxer(dir.path(), 2);

    for id in 0..5 {
        muxer.publish(&instance_event(id));
    }
    // Interleave reads and writes while the spool still holds a backlog.
    assert_eq!(instance_id(&read_event(&muxer).await), 0);
    muxer.publish(&instance_event(5));
    assert_eq!(instance_id(&read_event(&muxer).await), 1);
    muxer.publish(&instance_event(6));

    for id in 2..7 {
        assert_eq!(instance_id(&read_event(&muxer).await), id);
    }
}

#[tokio::test]
async fn test_shutdown_returns_sentinel() {
    let dir = TempDir::new().unwrap();
    let muxer = Arc::new(open_muxer(dir.path(), 100));

    let reader = {
        let muxer = Arc::clone(&muxer);
        tokio::spawn(async move { matches!(muxer.read(Duration::from_secs(5)).await, ReadOutcome::Shutdown) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    muxer.shutdown();
    assert!(reader.await.unwrap());
}

#[tokio::test]
async fn test_unconsumed_events_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let muxer = open_muxer(dir.path(), 3);
        for id in 0..8 {
            muxer.publish(&instance_event(id));
        }
        // Read two without acknowledging: they must come back first.
        read_event(&muxer).await;
        read_event(&muxer).await;
        muxer.shutdown();
    }

    let muxer = open_muxer(dir.path(), 3);
    for id in 0..8 {
        assert_eq!(instance_id(&read_event(&muxer).await), id, "prefix must be gapless");
    }
    assert!(matches!(
        muxer.read(Duration::from_millis(10)).await,
        ReadOutcome::Timeout
    ));
}

#[tokio::test]
async fn test_acknowledged_events_do_not_reappear() {
    let dir = TempDir::new().unwrap();

    {
        let muxer = open_muxer(dir.path(), 100);
        for id in 0..5 {
            muxer.publish(&instance_event(id));
        }
        for _ in 0..3 {
            read_event(&muxer).await;
        }
        muxer.ack(3);
        muxer.shutdown();
    }

    let muxer = open_muxer(dir.path(), 100);
    assert_eq!(instance_id(&read_event(&muxer).await), 3);
    assert_eq!(instance_id(&read_event(&muxer).await), 4);
}
