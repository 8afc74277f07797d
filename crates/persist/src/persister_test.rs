use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use vigil_bus::{Engine, Muxer, MuxerOptions, ReadOutcome};
use vigil_protocol::{
    types, Comment, Downtime, Event, Host, HostGroup, HostGroupMember, HostStatus, Instance,
    Payload, Registry, Service, ServiceStatus,
};

use crate::persister::{Persister, PersisterConfig};

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn test_config(path: &str) -> PersisterConfig {
    PersisterConfig {
        db_path: path.into(),
        connections: 3,
        queries_per_transaction: 10,
        flush_interval: Duration::from_millis(100),
        ..Default::default()
    }
}

async fn test_persister(engine: Arc<Engine>) -> Persister {
    Persister::connect(test_config(":memory:"), engine)
        .await
        .unwrap()
}

/// RRD-side muxer capturing the derived storage events
fn rrd_muxer(dir: &std::path::Path, engine: &Engine) -> Arc<Muxer> {
    let filter: HashSet<_> = [
        types::PB_METRIC,
        types::PB_STATUS,
        types::PB_INDEX_MAPPING,
        types::PB_METRIC_MAPPING,
    ]
    .into_iter()
    .collect();
    let muxer = Arc::new(
        Muxer::open(
            "rrd",
            dir,
            filter,
            HashSet::new(),
            Arc::new(Registry::bootstrap()),
            MuxerOptions::default(),
        )
        .unwrap(),
    );
    engine.register(Arc::clone(&muxer)).unwrap();
    muxer
}

async fn fetch_one(persister: &Persister, sql: &str) -> Option<Vec<i64>> {
    let conn = persister.database().connect().unwrap();
    let mut rows = conn.query(sql, ()).await.unwrap();
    match rows.next().await.unwrap() {
        Some(row) => {
            let mut values = Vec::new();
            let mut idx = 0;
            while let Ok(v) = row.get::<i64>(idx) {
                values.push(v);
                idx += 1;
            }
            Some(values)
        }
        None => None,
    }
}

async fn count(persister: &Persister, sql: &str) -> i64 {
    fetch_one(persister, sql).await.unwrap()[0]
}

fn instance_event(id: u32, running: bool) -> Event {
    Event::new(
        types::INSTANCE,
        Payload::Instance(Instance {
            instance_id: id,
            name: format!("p{id}"),
            running,
            start_time: 1000,
            end_time: if running { 0 } else { 2000 },
            pid: 42,
            version: "24.04".into(),
        }),
    )
}

fn host_event(instance_id: u32, host_id: u32, name: &str) -> Event {
    Event::new(
        types::HOST,
        Payload::Host(Host {
            host_id,
            instance_id,
            name: name.into(),
            alias: name.into(),
            address: "10.0.0.1".into(),
            enabled: true,
            check_interval: 5.0,
            max_check_attempts: 3,
            active_checks_enabled: true,
            ..Default::default()
        }),
    )
}

fn service_event(host_id: u32, service_id: u32, description: &str) -> Event {
    Event::new(
        types::SERVICE,
        Payload::Service(Service {
            host_id,
            service_id,
            description: description.into(),
            enabled: true,
            check_interval: 1.0,
            max_check_attempts: 3,
            ..Default::default()
        }),
    )
}

fn service_status_event(host_id: u32, service_id: u32, perfdata: &str) -> Event {
    Event::new(
        types::SERVICE_STATUS,
        Payload::ServiceStatus(ServiceStatus {
            host_id,
            service_id,
            checked: true,
            check_type: 0,
            current_state: 1,
            state_type: 1,
            last_check: now(),
            next_check: now() + 60,
            check_interval: 1.0,
            output: "WARNING".into(),
            perfdata: perfdata.into(),
            ..Default::default()
        }),
    )
}

#[tokio::test]
async fn test_scenario_a_cold_start_first_host() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;
    persister.dispatch(host_event(1, 42, "h")).await;
    persister.quiesce().await.unwrap();

    let instance = fetch_one(
        &persister,
        "SELECT instance_id, running, outdated FROM instances",
    )
    .await
    .expect("instance row");
    assert_eq!(instance, vec![1, 1, 0]);

    let host = fetch_one(
        &persister,
        "SELECT host_id, instance_id, enabled FROM hosts",
    )
    .await
    .expect("host row");
    assert_eq!(host, vec![42, 1, 1]);

    let resource = fetch_one(
        &persister,
        "SELECT id, parent_id, type, enabled FROM resources",
    )
    .await
    .expect("resource row");
    assert_eq!(resource, vec![42, 0, 0, 1]);

    // host -> instance mapping is live
    assert_eq!(persister.stats_handle().snapshot().cached_hosts, 1);
}

#[tokio::test]
async fn test_scenario_b_perfdata_creates_index_and_metrics() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::new());
    let rrd = rrd_muxer(dir.path(), &engine);
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;
    persister.dispatch(host_event(1, 42, "h")).await;
    persister.dispatch(service_event(42, 7, "cpu")).await;
    persister
        .dispatch(service_status_event(42, 7, "load=0.42;1;2;0;4 mem=35%;80;95"))
        .await;
    persister.quiesce().await.unwrap();

    assert_eq!(count(&persister, "SELECT COUNT(*) FROM services").await, 1);

    let index = fetch_one(
        &persister,
        "SELECT host_id, service_id, check_interval FROM index_data",
    )
    .await
    .expect("index row");
    assert_eq!(index, vec![42, 7, 1]);

    assert_eq!(count(&persister, "SELECT COUNT(*) FROM metrics").await, 2);
    let names: Vec<String> = {
        let conn = persister.database().connect().unwrap();
        let mut rows = conn
            .query("SELECT metric_name FROM metrics ORDER BY metric_name", ())
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get(0).unwrap());
        }
        names
    };
    assert_eq!(names, vec!["load".to_string(), "mem".to_string()]);

    // Derived events for the RRD writer: mapping events, two metrics, one
    // status.
    let mut kinds = Vec::new();
    loop {
        match rrd.read(Duration::from_millis(50)).await {
            ReadOutcome::Event(event) => kinds.push(event.payload.kind()),
            _ => break,
        }
    }
    assert_eq!(kinds.iter().filter(|k| **k == "index_mapping").count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == "metric_mapping").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "metric").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "status").count(), 1);

    // data_bin got one row per metric sample.
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM data_bin").await, 2);
}

#[tokio::test]
async fn test_scenario_c_stale_status_dropped() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;
    persister.dispatch(host_event(1, 42, "h")).await;
    persister.quiesce().await.unwrap();

    persister
        .dispatch(Event::new(
            types::HOST_STATUS,
            Payload::HostStatus(HostStatus {
                host_id: 42,
                checked: true,
                check_type: 0, // active
                current_state: 2,
                next_check: now() - 3600,
                last_check: now() - 3660,
                output: "late".into(),
                ..Default::default()
            }),
        ))
        .await;
    persister.quiesce().await.unwrap();

    assert_eq!(persister.stats_handle().snapshot().stale_status_dropped, 1);
    // No UPDATE happened: state is still the column default.
    let host = fetch_one(&persister, "SELECT COALESCE(state, -1) FROM hosts")
        .await
        .unwrap();
    assert_eq!(host, vec![-1]);
}

#[tokio::test]
async fn test_fresh_status_is_applied_and_mirrored() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;
    persister.dispatch(host_event(1, 42, "h")).await;
    persister
        .dispatch(Event::new(
            types::HOST_STATUS,
            Payload::HostStatus(HostStatus {
                host_id: 42,
                checked: true,
                check_type: 0,
                current_state: 1,
                state_type: 1,
                current_check_attempt: 2,
                last_check: now(),
                next_check: now() + 300,
                output: "DOWN-ish".into(),
                scheduled_downtime_depth: 1,
                ..Default::default()
            }),
        ))
        .await;
    persister.quiesce().await.unwrap();

    let host = fetch_one(&persister, "SELECT state, state_type FROM hosts")
        .await
        .unwrap();
    assert_eq!(host, vec![1, 1]);

    let resource = fetch_one(
        &persister,
        "SELECT status, status_confirmed, in_downtime FROM resources",
    )
    .await
    .unwrap();
    assert_eq!(resource, vec![1, 1, 1]);
}

#[tokio::test]
async fn test_scenario_d_instance_disappears() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;
    persister.dispatch(host_event(1, 42, "h")).await;
    persister.dispatch(service_event(42, 7, "cpu")).await;
    persister
        .dispatch(Event::new(
            types::HOST_GROUP,
            Payload::HostGroup(HostGroup {
                hostgroup_id: 5,
                instance_id: 1,
                name: "edge".into(),
                enabled: true,
            }),
        ))
        .await;
    persister
        .dispatch(Event::new(
            types::HOST_GROUP_MEMBER,
            Payload::HostGroupMember(HostGroupMember {
                hostgroup_id: 5,
                instance_id: 1,
                host_id: 42,
                enabled: true,
            }),
        ))
        .await;
    persister
        .dispatch(Event::new(
            types::DOWNTIME,
            Payload::Downtime(Downtime {
                instance_id: 1,
                host_id: 42,
                internal_id: 9,
                entry_time: 100,
                start_time: 100,
                end_time: 10_000,
                actual_start_time: 100,
                actual_end_time: 0,
                fixed: true,
                started: true,
                ..Default::default()
            }),
        ))
        .await;
    persister
        .dispatch(Event::new(
            types::COMMENT,
            Payload::Comment(Comment {
                instance_id: 1,
                host_id: 42,
                internal_id: 3,
                entry_time: 100,
                author: "admin".into(),
                data: "transient note".into(),
                persistent: false,
                ..Default::default()
            }),
        ))
        .await;
    persister
        .dispatch(Event::new(
            types::CUSTOM_VARIABLE,
            Payload::CustomVariable(vigil_protocol::CustomVariable {
                host_id: 42,
                name: "ROLE".into(),
                value: "edge".into(),
                enabled: true,
                ..Default::default()
            }),
        ))
        .await;
    persister.quiesce().await.unwrap();

    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM hosts_hostgroups").await,
        1
    );
    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM customvariables").await,
        1
    );

    // The poller goes away.
    persister.dispatch(instance_event(1, false)).await;
    persister.quiesce().await.unwrap();

    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM hosts WHERE enabled = 0").await,
        1
    );
    assert_eq!(
        count(
            &persister,
            "SELECT COUNT(*) FROM resources WHERE enabled = 0"
        )
        .await,
        1
    );
    assert_eq!(
        count(
            &persister,
            "SELECT COUNT(*) FROM downtimes WHERE cancelled = 1"
        )
        .await,
        1
    );
    assert_eq!(
        count(
            &persister,
            "SELECT COUNT(*) FROM comments WHERE deletion_time > 0"
        )
        .await,
        1
    );
    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM customvariables").await,
        0
    );
    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM hosts_hostgroups").await,
        0
    );

    // One minute later the empty groups are reaped; the test forces the
    // timer instead of waiting.
    persister.trigger_group_cleanup();
    persister.run_due_group_cleanup().await;
    persister.quiesce().await.unwrap();
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM hostgroups").await, 0);
}

#[tokio::test]
async fn test_idempotent_replay_leaves_same_state() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    for _ in 0..2 {
        persister.dispatch(instance_event(1, true)).await;
        persister.dispatch(host_event(1, 42, "h")).await;
        persister.dispatch(service_event(42, 7, "cpu")).await;
        persister
            .dispatch(service_status_event(42, 7, "load=0.42;1;2;0;4"))
            .await;
        persister.quiesce().await.unwrap();
    }

    assert_eq!(count(&persister, "SELECT COUNT(*) FROM instances").await, 1);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM hosts").await, 1);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM services").await, 1);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM resources").await, 2);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM index_data").await, 1);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM metrics").await, 1);
}

#[tokio::test]
async fn test_index_and_metric_ids_stable_across_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vigil.db");
    let path = path.to_str().unwrap();

    let first_ids = {
        let engine = Arc::new(Engine::new());
        let mut persister = Persister::connect(test_config(path), Arc::clone(&engine))
            .await
            .unwrap();
        persister.dispatch(instance_event(1, true)).await;
        persister.dispatch(host_event(1, 42, "h")).await;
        persister.dispatch(service_event(42, 7, "cpu")).await;
        persister
            .dispatch(service_status_event(42, 7, "load=0.42;1;2;0;4"))
            .await;
        persister.quiesce().await.unwrap();
        fetch_one(
            &persister,
            "SELECT id.id, m.metric_id FROM index_data id JOIN metrics m ON m.index_id = id.id",
        )
        .await
        .expect("index and metric")
    };

    // Restart: caches reload from disk, the same keys resolve to the same
    // surrogates and no duplicate rows appear.
    let engine = Arc::new(Engine::new());
    let mut persister = Persister::connect(test_config(path), Arc::clone(&engine))
        .await
        .unwrap();
    persister
        .dispatch(service_status_event(42, 7, "load=0.43;1;2;0;4"))
        .await;
    persister.quiesce().await.unwrap();

    let second_ids = fetch_one(
        &persister,
        "SELECT id.id, m.metric_id FROM index_data id JOIN metrics m ON m.index_id = id.id",
    )
    .await
    .expect("index and metric");
    assert_eq!(first_ids, second_ids);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM index_data").await, 1);
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM metrics").await, 1);
}

#[tokio::test]
async fn test_check_command_writes_skip_unchanged_hash() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;
    persister.dispatch(host_event(1, 42, "h")).await;

    let check = |cmd: &str| {
        Event::new(
            types::HOST_CHECK,
            Payload::HostCheck(vigil_protocol::HostCheck {
                host_id: 42,
                command_line: cmd.into(),
                check_type: 0,
                active_checks_enabled: true,
                next_check: now() + 60,
            }),
        )
    };

    persister.dispatch(check("check_icmp -H 10.0.0.1")).await;
    persister.dispatch(check("check_icmp -H 10.0.0.1")).await;
    persister.dispatch(check("check_icmp -H 10.0.0.2")).await;
    persister.quiesce().await.unwrap();

    let host = fetch_one(&persister, "SELECT COUNT(*) FROM hosts WHERE command_line = 'check_icmp -H 10.0.0.2'")
        .await
        .unwrap();
    assert_eq!(host, vec![1]);
}

#[tokio::test]
async fn test_severity_delete_is_a_noop() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister
        .dispatch(Event::new(
            types::PB_SEVERITY,
            Payload::Severity(vigil_protocol::Severity {
                action: vigil_protocol::RefAction::Add,
                id: 3,
                severity_type: 1,
                level: 2,
                icon_id: 0,
                name: "major".into(),
                instance_id: 1,
            }),
        ))
        .await;
    persister.quiesce().await.unwrap();
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM severities").await, 1);

    persister
        .dispatch(Event::new(
            types::PB_SEVERITY,
            Payload::Severity(vigil_protocol::Severity {
                action: vigil_protocol::RefAction::Delete,
                id: 3,
                severity_type: 1,
                ..Default::default()
            }),
        ))
        .await;
    persister.quiesce().await.unwrap();

    // The row deliberately survives.
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM severities").await, 1);
}

#[tokio::test]
async fn test_resource_tags_rewritten_from_event() {
    let engine = Arc::new(Engine::new());
    let mut persister = test_persister(Arc::clone(&engine)).await;

    persister.dispatch(instance_event(1, true)).await;

    let tagged_host = |tags: Vec<vigil_protocol::TagRef>| {
        let mut host = match host_event(1, 42, "h").payload {
            Payload::Host(h) => h,
            _ => unreachable!(),
        };
        host.tags = tags;
        Event::new(types::PB_HOST, Payload::Host(host))
    };

    persister
        .dispatch(tagged_host(vec![
            vigil_protocol::TagRef {
                id: 10,
                kind: vigil_protocol::TagKind::HostGroup,
            },
            vigil_protocol::TagRef {
                id: 11,
                kind: vigil_protocol::TagKind::HostCategory,
            },
        ]))
        .await;
    persister.quiesce().await.unwrap();
    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM resources_tags").await,
        2
    );
    assert_eq!(count(&persister, "SELECT COUNT(*) FROM tags").await, 2);

    // A new definition replaces the link set.
    persister
        .dispatch(tagged_host(vec![vigil_protocol::TagRef {
            id: 12,
            kind: vigil_protocol::TagKind::HostCategory,
        }]))
        .await;
    persister.quiesce().await.unwrap();
    assert_eq!(
        count(&persister, "SELECT COUNT(*) FROM resources_tags").await,
        1
    );
}
