//! Connection pool with per-connection ordering
//!
//! Each logical connection is one worker task executing submitted
//! statements strictly in submission order, batched into explicit
//! transactions of `queries_per_transaction` statements. Cross-family
//! dependencies are handled with action-mask barriers: `finish_action`
//! blocks until every previously-submitted statement on the connection
//! whose mask intersects has executed and been committed.
//!
//! A failed statement is statement-fatal only: the error is logged with
//! its mask, a counter bumps, and the worker moves on. One poisonous row
//! must not stop the pipeline.
//!
//! Routing rules: events scoped to a poller hash to a stable connection so
//! a poller's writes serialize; globally-shared tables go through fixed
//! "special" connections; everything else picks the least-loaded worker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use turso::{Database, Value};

use crate::error::PersistError;
use crate::Result;

/// `finish_action` target meaning "every connection"
pub const ALL_CONNECTIONS: i32 = -1;

/// Families whose cross-instance writes serialize on one fixed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SpecialConn {
    CustomVariable = 0,
    Downtime = 1,
    Log = 2,
    HostGroup = 3,
    ServiceGroup = 4,
    HostDependency = 5,
    ServiceDependency = 6,
    HostParent = 7,
    Severity = 8,
    Tag = 9,
    Acknowledgement = 10,
}

enum Job {
    Execute {
        sql: String,
        params: Vec<Value>,
        mask: u32,
        seq: u64,
    },
    Commit {
        seq: u64,
    },
}

struct ConnShared {
    /// `(seq, mask)` of submitted-but-not-completed jobs, FIFO
    pending: Mutex<VecDeque<(u64, u32)>>,
    /// Statements executed since the last commit
    uncommitted: AtomicUsize,
    submitted: AtomicU64,
    sql_errors: AtomicU64,
    statements: AtomicU64,
}

struct ConnHandle {
    tx: mpsc::UnboundedSender<Job>,
    shared: Arc<ConnShared>,
    completed: watch::Receiver<u64>,
}

/// Fixed-size pool of single-threaded connection workers
pub struct ConnectionPool {
    conns: Vec<ConnHandle>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Spawn `count` workers over connections to `db`
    pub fn new(db: &Database, count: usize, queries_per_transaction: usize) -> Result<Self> {
        let mut conns = Vec::with_capacity(count);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let conn = db.connect()?;
            let (tx, rx) = mpsc::unbounded_channel();
            let (completed_tx, completed_rx) = watch::channel(0u64);
            let shared = Arc::new(ConnShared {
                pending: Mutex::new(VecDeque::new()),
                uncommitted: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                sql_errors: AtomicU64::new(0),
                statements: AtomicU64::new(0),
            });
            workers.push(tokio::spawn(worker_loop(
                index,
                conn,
                rx,
                completed_tx,
                Arc::clone(&shared),
                queries_per_transaction,
            )));
            conns.push(ConnHandle {
                tx,
                shared,
                completed: completed_rx,
            });
        }
        Ok(Self {
            conns,
            workers: Mutex::new(workers),
        })
    }

    /// Number of logical connections
    pub fn count(&self) -> usize {
        self.conns.len()
    }

    /// Stable connection for everything scoped to one poller
    pub fn by_instance(&self, instance_id: u32) -> usize {
        instance_id as usize % self.conns.len()
    }

    /// Fixed connection serializing a globally-shared table family
    pub fn special(&self, family: SpecialConn) -> usize {
        family as usize % self.conns.len()
    }

    /// Least-loaded connection for fully independent writes
    pub fn best(&self) -> usize {
        self.conns
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.shared.pending.lock().len())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Submit a statement tagged with `mask`, preserving submission order
    pub fn execute(&self, conn: usize, mask: u32, sql: String, params: Vec<Value>) -> Result<()> {
        let handle = &self.conns[conn];
        let seq = handle.shared.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        handle.shared.pending.lock().push_back((seq, mask));
        handle
            .tx
            .send(Job::Execute {
                sql,
                params,
                mask,
                seq,
            })
            .map_err(|_| PersistError::ConnectionClosed(conn))
    }

    /// Wait until all prior statements on `conn` intersecting `mask` have
    /// executed and committed; `ALL_CONNECTIONS` targets every connection
    pub async fn finish_action(&self, conn: i32, mask: u32) -> Result<()> {
        if conn == ALL_CONNECTIONS {
            for index in 0..self.conns.len() {
                self.finish_one(index, mask).await?;
            }
            return Ok(());
        }
        self.finish_one(conn as usize, mask).await
    }

    async fn finish_one(&self, conn: usize, mask: u32) -> Result<()> {
        let handle = &self.conns[conn];
        {
            let pending = handle.shared.pending.lock();
            let intersects = pending.iter().any(|(_, m)| m & mask != 0);
            if !intersects && handle.shared.uncommitted.load(Ordering::Acquire) == 0 {
                return Ok(());
            }
        }
        // A commit job behind the intersecting work gives both ordering
        // and cross-connection visibility.
        let seq = handle.shared.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        handle.shared.pending.lock().push_back((seq, 0));
        handle
            .tx
            .send(Job::Commit { seq })
            .map_err(|_| PersistError::ConnectionClosed(conn))?;

        let mut completed = handle.completed.clone();
        while *completed.borrow() < seq {
            if completed.changed().await.is_err() {
                return Err(PersistError::ConnectionClosed(conn));
            }
        }
        Ok(())
    }

    /// Ask every worker to commit its open transaction (not awaited)
    pub fn commit_all(&self) {
        for (index, handle) in self.conns.iter().enumerate() {
            let seq = handle.shared.submitted.fetch_add(1, Ordering::AcqRel) + 1;
            handle.shared.pending.lock().push_back((seq, 0));
            if handle.tx.send(Job::Commit { seq }).is_err() {
                tracing::warn!(conn = index, "commit request on closed connection");
            }
        }
    }

    /// Statements that failed at the SQL level
    pub fn sql_errors(&self) -> u64 {
        self.conns
            .iter()
            .map(|c| c.shared.sql_errors.load(Ordering::Relaxed))
            .sum()
    }

    /// Statements executed across all connections
    pub fn statements_executed(&self) -> u64 {
        self.conns
            .iter()
            .map(|c| c.shared.statements.load(Ordering::Relaxed))
            .sum()
    }

    /// Jobs submitted but not yet executed
    pub fn pending_statements(&self) -> usize {
        self.conns
            .iter()
            .map(|c| c.shared.pending.lock().len())
            .sum()
    }

    /// Drain every queue, commit, and join the workers
    pub async fn shutdown(self) {
        for handle in &self.conns {
            let seq = handle.shared.submitted.fetch_add(1, Ordering::AcqRel) + 1;
            handle.shared.pending.lock().push_back((seq, 0));
            let _ = handle.tx.send(Job::Commit { seq });
        }
        // Dropping the senders closes each queue; workers exit once the
        // backlog is executed and committed.
        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock());
        drop(self.conns);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "connection worker join failed");
            }
        }
    }
}

async fn worker_loop(
    index: usize,
    conn: turso::Connection,
    mut rx: mpsc::UnboundedReceiver<Job>,
    completed: watch::Sender<u64>,
    shared: Arc<ConnShared>,
    queries_per_transaction: usize,
) {
    tracing::debug!(conn = index, "connection worker starting");
    let mut in_tx = false;
    let mut stmts_in_tx = 0usize;

    while let Some(job) = rx.recv().await {
        let seq = match job {
            Job::Execute {
                sql,
                params,
                mask,
                seq,
            } => {
                if !in_tx {
                    match conn.execute("BEGIN", ()).await {
                        Ok(_) => {
                            in_tx = true;
                            stmts_in_tx = 0;
                        }
                        Err(e) => {
                            tracing::error!(conn = index, error = %e, "BEGIN failed");
                        }
                    }
                }
                match conn.execute(&sql, params).await {
                    Ok(_) => {
                        shared.statements.fetch_add(1, Ordering::Relaxed);
                        shared.uncommitted.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(e) => {
                        // Statement-fatal: log, count, keep the pipeline up.
                        shared.sql_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            conn = index,
                            mask = format_args!("{mask:#x}"),
                            error = %e,
                            sql = sql.lines().next().unwrap_or(&sql),
                            "statement failed, event dropped"
                        );
                    }
                }
                stmts_in_tx += 1;
                if in_tx && stmts_in_tx >= queries_per_transaction {
                    commit(index, &conn, &shared).await;
                    in_tx = false;
                }
                seq
            }
            Job::Commit { seq } => {
                if in_tx {
                    commit(index, &conn, &shared).await;
                    in_tx = false;
                }
                seq
            }
        };

        let mut pending = shared.pending.lock();
        while let Some(&(front_seq, _)) = pending.front() {
            if front_seq <= seq {
                pending.pop_front();
            } else {
                break;
            }
        }
        drop(pending);
        let _ = completed.send(seq);
    }

    if in_tx {
        commit(index, &conn, &shared).await;
    }
    tracing::debug!(conn = index, "connection worker stopped");
}

async fn commit(index: usize, conn: &turso::Connection, shared: &ConnShared) {
    if let Err(e) = conn.execute("COMMIT", ()).await {
        tracing::error!(conn = index, error = %e, "COMMIT failed");
        shared.sql_errors.fetch_add(1, Ordering::Relaxed);
    }
    shared.uncommitted.store(0, Ordering::Release);
}

// Small constructors keeping handler code short.

/// Text parameter
pub fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

/// Integer parameter
pub fn int(value: impl Into<i64>) -> Value {
    Value::Integer(value.into())
}

/// Float parameter
pub fn real(value: f64) -> Value {
    Value::Real(value)
}

/// Boolean parameter stored as 0/1
pub fn boolean(value: bool) -> Value {
    Value::Integer(value as i64)
}

/// Nullable float; NaN maps to NULL
pub fn opt_real(value: Option<f64>) -> Value {
    match value {
        Some(v) if v.is_finite() => Value::Real(v),
        _ => Value::Null,
    }
}
