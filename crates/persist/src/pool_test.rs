use turso::{Builder, Database};

use crate::actions::{Action, ALL_ACTIONS};
use crate::pool::{int, ConnectionPool, SpecialConn, ALL_CONNECTIONS};

async fn test_db() -> Database {
    let db = Builder::new_local(":memory:").build().await.unwrap();
    let conn = db.connect().unwrap();
    conn.execute(
        "CREATE TABLE t (k INTEGER PRIMARY KEY, v INTEGER)",
        (),
    )
    .await
    .unwrap();
    db
}

fn upsert(v: i64) -> (String, Vec<turso::Value>) {
    (
        "INSERT INTO t (k, v) VALUES (?1, ?2) \
         ON CONFLICT(k) DO UPDATE SET v = excluded.v"
            .to_string(),
        vec![int(1), int(v)],
    )
}

async fn fetch_v(db: &Database, k: i64) -> Option<i64> {
    let conn = db.connect().unwrap();
    let mut rows = conn
        .query("SELECT v FROM t WHERE k = ?1", vec![int(k)])
        .await
        .unwrap();
    match rows.next().await.unwrap() {
        Some(row) => Some(row.get(0).unwrap()),
        None => None,
    }
}

#[tokio::test]
async fn test_routing_is_stable() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 3, 100).unwrap();

    assert_eq!(pool.by_instance(7), pool.by_instance(7));
    assert_eq!(pool.by_instance(7), 7 % 3);
    assert_eq!(pool.special(SpecialConn::Severity), 8 % 3);
    assert_eq!(
        pool.special(SpecialConn::Severity),
        pool.special(SpecialConn::Severity)
    );
    assert!(pool.best() < pool.count());
    pool.shutdown().await;
}

#[tokio::test]
async fn test_statements_apply_in_submission_order() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 2, 1000).unwrap();

    for v in 0..100i64 {
        let (sql, params) = upsert(v);
        pool.execute(0, Action::Hosts.mask(), sql, params).unwrap();
    }
    pool.finish_action(0, Action::Hosts.mask()).await.unwrap();

    // Last submitted write wins only if execution preserved order.
    assert_eq!(fetch_v(&db, 1).await, Some(99));
    assert_eq!(pool.statements_executed(), 100);
    assert_eq!(pool.sql_errors(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_finish_action_makes_writes_visible() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 2, 1000).unwrap();

    let (sql, params) = upsert(42);
    pool.execute(1, Action::Instances.mask(), sql, params)
        .unwrap();

    // The batching transaction is still open until the barrier commits it.
    pool.finish_action(1, Action::Instances.mask())
        .await
        .unwrap();
    assert_eq!(fetch_v(&db, 1).await, Some(42));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_finish_action_all_connections() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 3, 1000).unwrap();

    for conn in 0..3 {
        pool.execute(
            conn,
            Action::Hosts.mask(),
            "INSERT INTO t (k, v) VALUES (?1, ?2)".into(),
            vec![int(conn as i64 + 10), int(conn as i64)],
        )
        .unwrap();
    }
    pool.finish_action(ALL_CONNECTIONS, ALL_ACTIONS)
        .await
        .unwrap();

    for conn in 0..3i64 {
        assert_eq!(fetch_v(&db, conn + 10).await, Some(conn));
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn test_finish_action_skips_idle_connection() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 2, 1000).unwrap();

    // Nothing submitted, nothing uncommitted: the barrier is a no-op and
    // must return immediately.
    tokio::time::timeout(
        std::time::Duration::from_millis(100),
        pool.finish_action(0, ALL_ACTIONS),
    )
    .await
    .expect("idle barrier must not block")
    .unwrap();
    pool.shutdown().await;
}

#[tokio::test]
async fn test_failed_statement_does_not_stop_the_worker() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 1, 1000).unwrap();

    pool.execute(
        0,
        Action::Hosts.mask(),
        "INSERT INTO missing_table VALUES (1)".into(),
        Vec::new(),
    )
    .unwrap();
    let (sql, params) = upsert(7);
    pool.execute(0, Action::Hosts.mask(), sql, params).unwrap();
    pool.finish_action(0, ALL_ACTIONS).await.unwrap();

    assert_eq!(pool.sql_errors(), 1);
    assert_eq!(fetch_v(&db, 1).await, Some(7));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_transaction_batching_commits_at_threshold() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 1, 2).unwrap();

    for v in 0..5i64 {
        let (sql, params) = upsert(v);
        pool.execute(0, Action::Hosts.mask(), sql, params).unwrap();
    }
    pool.finish_action(0, ALL_ACTIONS).await.unwrap();
    assert_eq!(fetch_v(&db, 1).await, Some(4));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_backlog() {
    let db = test_db().await;
    let pool = ConnectionPool::new(&db, 2, 1000).unwrap();

    for v in 0..50u32 {
        pool.execute(
            (v % 2) as usize,
            Action::Hosts.mask(),
            "INSERT INTO t (k, v) VALUES (?1, ?2)".into(),
            vec![int(100 + v as i64), int(v as i64)],
        )
        .unwrap();
    }
    pool.shutdown().await;

    let conn = db.connect().unwrap();
    let mut rows = conn.query("SELECT COUNT(*) FROM t", ()).await.unwrap();
    let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
    assert_eq!(count, 50);
}
