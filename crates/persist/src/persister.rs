//! Event dispatch and per-kind handlers
//!
//! One task owns the persister: it reads its muxer, dispatches each event
//! to the handler for its kind, and acknowledges it once the resulting
//! statements are queued. Handlers are idempotent upserts keyed on the
//! entity's natural key; legacy and protobuf representations of a fact go
//! through the same handler because both decode into the same payload.
//!
//! Failure policy: nothing propagates across the dispatch boundary. A
//! statement error is logged with the event's natural key and counted; a
//! cache inconsistency falls back to a targeted SELECT and, failing that,
//! drops the event at critical level.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use turso::{Builder, Database, Value};

use vigil_bus::{Engine, Muxer, ReadOutcome};
use vigil_protocol::{types, Event, Payload, RefAction};
use vigil_protocol::{
    Acknowledgement, AdaptiveHost, AdaptiveService, Comment, CustomVariable, CustomVariableStatus,
    Downtime, Host, HostCheck, HostDependency, HostGroup, HostGroupMember, HostParent, HostStatus,
    IndexMapping, Instance, InstanceStatus, LogEntry, Metric, MetricMapping, Module, PerfStatus,
    RemoveGraph, Service, ServiceCheck, ServiceDependency, ServiceGroup, ServiceGroupMember,
    ServiceStatus, Severity, Tag,
};

use crate::actions::{mask_of, Action, ALL_ACTIONS};
use crate::cache::{Caches, IndexInfo, MetricInfo};
use crate::perfdata::parse_perfdata;
use crate::pool::{boolean, int, opt_real, real, text, ConnectionPool, SpecialConn, ALL_CONNECTIONS};
use crate::queues::StagingQueues;
use crate::schema::{self, ColumnSizes};
use crate::{Result, STALE_STATUS_WINDOW_SECS};

/// Persister tuning knobs
#[derive(Debug, Clone)]
pub struct PersisterConfig {
    /// Database file path (`:memory:` accepted for tests)
    pub db_path: String,
    /// Logical connection count
    pub connections: usize,
    /// Statements per explicit transaction
    pub queries_per_transaction: usize,
    /// Seconds without status before an instance is outdated; 0 disables
    pub instance_timeout: u64,
    /// Write the legacy `hosts`/`services` tables
    pub store_in_hosts_services: bool,
    /// Mirror state into `resources`
    pub store_in_resources: bool,
    /// Persist raw perfdata samples into `data_bin`
    pub store_in_data_bin: bool,
    /// Default retention assigned to new indexes (seconds)
    pub rrd_len: i32,
    /// Seconds per check-interval unit
    pub interval_length: u32,
    /// Staging queue flush cadence
    pub flush_interval: Duration,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            db_path: "vigil.db".into(),
            connections: 3,
            queries_per_transaction: 2000,
            instance_timeout: 300,
            store_in_hosts_services: true,
            store_in_resources: true,
            store_in_data_bin: true,
            rrd_len: 15_552_000,
            interval_length: 60,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Counter snapshot for the stats reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct PersisterStats {
    pub events_processed: u64,
    pub stale_status_dropped: u64,
    pub ignored_events: u64,
    pub derived_events: u64,
    pub sql_errors: u64,
    pub pending_statements: usize,
    pub staged_rows: usize,
    pub cached_hosts: usize,
    pub cached_indexes: usize,
    pub cached_metrics: usize,
}

#[derive(Default)]
struct SharedCounters {
    events_processed: AtomicU64,
    stale_status_dropped: AtomicU64,
    ignored_events: AtomicU64,
    derived_events: AtomicU64,
    sql_errors: AtomicU64,
    pending_statements: AtomicUsize,
    staged_rows: AtomicUsize,
    cached_hosts: AtomicUsize,
    cached_indexes: AtomicUsize,
    cached_metrics: AtomicUsize,
}

/// Shareable view over the persister's counters
#[derive(Clone)]
pub struct PersisterStatsHandle {
    shared: Arc<SharedCounters>,
}

impl PersisterStatsHandle {
    /// Current counter values
    pub fn snapshot(&self) -> PersisterStats {
        let s = &self.shared;
        PersisterStats {
            events_processed: s.events_processed.load(Ordering::Relaxed),
            stale_status_dropped: s.stale_status_dropped.load(Ordering::Relaxed),
            ignored_events: s.ignored_events.load(Ordering::Relaxed),
            derived_events: s.derived_events.load(Ordering::Relaxed),
            sql_errors: s.sql_errors.load(Ordering::Relaxed),
            pending_statements: s.pending_statements.load(Ordering::Relaxed),
            staged_rows: s.staged_rows.load(Ordering::Relaxed),
            cached_hosts: s.cached_hosts.load(Ordering::Relaxed),
            cached_indexes: s.cached_indexes.load(Ordering::Relaxed),
            cached_metrics: s.cached_metrics.load(Ordering::Relaxed),
        }
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn hash_command(command_line: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    command_line.hash(&mut hasher);
    hasher.finish()
}

/// The SQL persister
pub struct Persister {
    config: PersisterConfig,
    db: Database,
    /// Direct connection for SELECT / INSERT..RETURNING paths
    conn: turso::Connection,
    pool: ConnectionPool,
    sizes: ColumnSizes,
    caches: Caches,
    queues: StagingQueues,
    engine: Arc<Engine>,
    shared: Arc<SharedCounters>,
    group_cleanup_due: Option<tokio::time::Instant>,
}

impl Persister {
    /// Open the store, bootstrap the schema, rebuild caches, spawn workers
    pub async fn connect(config: PersisterConfig, engine: Arc<Engine>) -> Result<Self> {
        let db = Builder::new_local(&config.db_path).build().await?;
        schema::bootstrap(&db).await?;
        let sizes = schema::discover_column_sizes(&db).await?;
        let caches = Caches::load(&db).await?;
        let pool = ConnectionPool::new(&db, config.connections, config.queries_per_transaction)?;
        let conn = db.connect()?;

        tracing::info!(
            path = %config.db_path,
            connections = config.connections,
            "sql persister connected"
        );

        Ok(Self {
            config,
            conn,
            db,
            pool,
            sizes,
            caches,
            queues: StagingQueues::default(),
            engine,
            shared: Arc::new(SharedCounters::default()),
            group_cleanup_due: None,
        })
    }

    /// Counter handle for the stats reporter
    pub fn stats_handle(&self) -> PersisterStatsHandle {
        PersisterStatsHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Underlying database handle (tests and tools)
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Consume the muxer until cancelled, then drain and stop
    pub async fn run(mut self, muxer: Arc<Muxer>, cancel: CancellationToken) {
        tracing::info!(muxer = %muxer.name(), "sql persister starting");
        let mut flush = tokio::time::interval(self.config.flush_interval);
        flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = flush.tick() => {
                    self.periodic_flush().await;
                }
                outcome = muxer.read(Duration::from_secs(1)) => match outcome {
                    ReadOutcome::Event(event) => {
                        self.dispatch(event).await;
                        muxer.ack(1);
                    }
                    ReadOutcome::Timeout => {}
                    ReadOutcome::Shutdown => break,
                },
            }
            self.run_due_group_cleanup().await;
        }

        // Shutdown order: staged rows out, then every connection queue
        // drained and committed.
        self.flush_queues();
        self.pool.shutdown().await;
        tracing::info!("sql persister stopped");
    }

    /// Route one event to its handler
    ///
    /// Never fails upward; every error becomes a log record plus counter.
    pub async fn dispatch(&mut self, event: Event) {
        self.shared.events_processed.fetch_add(1, Ordering::Relaxed);
        let kind = event.payload.kind();
        let result = match event.payload {
            Payload::Instance(e) => self.process_instance(e).await,
            Payload::InstanceStatus(e) => self.process_instance_status(e).await,
            Payload::Host(e) => self.process_host(e).await,
            Payload::Service(e) => self.process_service(e).await,
            Payload::AdaptiveHost(e) => self.process_adaptive_host(e).await,
            Payload::AdaptiveService(e) => self.process_adaptive_service(e).await,
            Payload::HostCheck(e) => self.process_host_check(e).await,
            Payload::ServiceCheck(e) => self.process_service_check(e).await,
            Payload::HostStatus(e) => self.process_host_status(e).await,
            Payload::ServiceStatus(e) => self.process_service_status(e).await,
            Payload::Comment(e) => self.process_comment(e),
            Payload::Downtime(e) => self.process_downtime(e),
            Payload::CustomVariable(e) => self.process_custom_variable(e),
            Payload::CustomVariableStatus(e) => self.process_custom_variable_status(e),
            Payload::LogEntry(e) => self.process_log(e),
            Payload::Acknowledgement(e) => self.process_acknowledgement(e).await,
            Payload::HostParent(e) => self.process_host_parent(e).await,
            Payload::HostDependency(e) => self.process_host_dependency(e).await,
            Payload::ServiceDependency(e) => self.process_service_dependency(e).await,
            Payload::HostGroup(e) => self.process_host_group(e).await,
            Payload::HostGroupMember(e) => self.process_host_group_member(e).await,
            Payload::ServiceGroup(e) => self.process_service_group(e).await,
            Payload::ServiceGroupMember(e) => self.process_service_group_member(e).await,
            Payload::Severity(e) => self.process_severity(e).await,
            Payload::Tag(e) => self.process_tag(e).await,
            Payload::Module(e) => self.process_module(e).await,
            Payload::RemoveGraph(e) => self.process_remove_graph(e).await,
            Payload::Rebuild(_)
            | Payload::Metric(_)
            | Payload::PerfStatus(_)
            | Payload::IndexMapping(_)
            | Payload::MetricMapping(_)
            | Payload::VersionResponse(_)
            | Payload::Ack(_) => {
                // Outputs of this stream, or control frames; nothing to do.
                self.shared.ignored_events.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        };
        if let Err(e) = result {
            self.shared.sql_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(kind, error = %e, "event dropped");
        }
    }

    // =========================================================================
    // Poller lifecycle
    // =========================================================================

    async fn process_instance(&mut self, instance: Instance) -> Result<()> {
        if self.caches.deleted_instances.contains(&instance.instance_id) {
            self.shared.ignored_events.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        tracing::info!(
            instance_id = instance.instance_id,
            name = %instance.name,
            running = instance.running,
            "instance event"
        );
        let conn = self.pool.by_instance(instance.instance_id);

        // The cleanup cascade rewrites most families for this poller, and
        // some of them live on the shared special connections; staged rows
        // must land and everything in flight must settle first.
        self.flush_queues();
        self.pool.finish_action(ALL_CONNECTIONS, ALL_ACTIONS).await?;
        self.clean_tables(instance.instance_id, conn)?;

        self.pool.execute(
            conn,
            Action::Instances.mask(),
            "INSERT INTO instances (instance_id,name,running,start_time,end_time,pid,version,\
             outdated) VALUES (?1,?2,?3,?4,?5,?6,?7,0) \
             ON CONFLICT(instance_id) DO UPDATE SET name=excluded.name, \
             running=excluded.running, start_time=excluded.start_time, \
             end_time=excluded.end_time, pid=excluded.pid, version=excluded.version, \
             outdated=0"
                .into(),
            vec![
                int(instance.instance_id),
                text(self.sizes.fit("instances", "name", &instance.name)),
                boolean(instance.running),
                int(instance.start_time),
                int(instance.end_time),
                int(instance.pid),
                text(self.sizes.fit("instances", "version", &instance.version)),
            ],
        )?;

        // Empty groups are reaped one minute later.
        self.group_cleanup_due = Some(tokio::time::Instant::now() + Duration::from_secs(60));
        Ok(())
    }

    /// Disable everything a poller owns before its fresh configuration
    fn clean_tables(&mut self, instance_id: u32, conn: usize) -> Result<()> {
        tracing::debug!(instance_id, "clean_tables");
        let hosts_of = "SELECT host_id FROM hosts WHERE instance_id = ?1";
        let id = int(instance_id);

        let statements: Vec<(u32, String)> = vec![
            (
                Action::Services.mask(),
                format!("UPDATE services SET enabled = 0 WHERE host_id IN ({hosts_of})"),
            ),
            (
                Action::Hosts.mask(),
                "UPDATE hosts SET enabled = 0 WHERE instance_id = ?1".into(),
            ),
            (
                Action::Resources.mask(),
                "UPDATE resources SET enabled = 0 WHERE poller_id = ?1".into(),
            ),
            (
                Action::HostGroups.mask(),
                format!("DELETE FROM hosts_hostgroups WHERE host_id IN ({hosts_of})"),
            ),
            (
                Action::ServiceGroups.mask(),
                format!("DELETE FROM services_servicegroups WHERE host_id IN ({hosts_of})"),
            ),
            (
                Action::HostParents.mask(),
                format!(
                    "DELETE FROM hosts_hosts_parents WHERE child_id IN ({hosts_of}) \
                     OR parent_id IN ({hosts_of})"
                ),
            ),
            (
                Action::HostDependencies.mask(),
                format!(
                    "DELETE FROM hosts_hosts_dependencies WHERE host_id IN ({hosts_of}) \
                     OR dependent_host_id IN ({hosts_of})"
                ),
            ),
            (
                Action::ServiceDependencies.mask(),
                format!(
                    "DELETE FROM services_services_dependencies WHERE host_id IN ({hosts_of}) \
                     OR dependent_host_id IN ({hosts_of})"
                ),
            ),
            (
                Action::Modules.mask(),
                "DELETE FROM modules WHERE instance_id = ?1".into(),
            ),
            (
                Action::Downtimes.mask(),
                "UPDATE downtimes SET cancelled = 1 WHERE actual_end_time = 0 \
                 AND cancelled = 0 AND instance_id = ?1"
                    .into(),
            ),
            (
                Action::Comments.mask(),
                format!(
                    "UPDATE comments SET deletion_time = {} WHERE instance_id = ?1 \
                     AND persistent = 0 AND deletion_time = 0",
                    now_epoch()
                ),
            ),
            (
                Action::CustomVariables.mask(),
                format!("DELETE FROM customvariables WHERE host_id IN ({hosts_of})"),
            ),
        ];

        for (mask, sql) in statements {
            self.pool.execute(conn, mask, sql, vec![id.clone()])?;
        }

        // Resource surrogates of the disabled objects are reclaimed.
        let gone: Vec<u32> = self
            .caches
            .host_instance
            .iter()
            .filter(|(_, inst)| **inst == instance_id)
            .map(|(host, _)| *host)
            .collect();
        self.caches
            .resources
            .retain(|(id, parent), _| !gone.contains(id) && !gone.contains(parent));
        self.caches.forget_instance_hosts(instance_id);
        Ok(())
    }

    async fn process_instance_status(&mut self, status: InstanceStatus) -> Result<()> {
        if self.caches.deleted_instances.contains(&status.instance_id) {
            self.shared.ignored_events.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        let conn = self.pool.by_instance(status.instance_id);
        self.pool.execute(
            conn,
            Action::Instances.mask(),
            "UPDATE instances SET last_alive = ?2, outdated = 0 WHERE instance_id = ?1".into(),
            vec![int(status.instance_id), int(status.last_alive)],
        )
    }

    async fn process_module(&mut self, module: Module) -> Result<()> {
        let conn = self.pool.by_instance(module.instance_id);
        if module.enabled {
            self.pool.execute(
                conn,
                Action::Modules.mask(),
                "INSERT INTO modules (instance_id,filename,args,loaded,should_be_loaded) \
                 VALUES (?1,?2,?3,?4,?5)"
                    .into(),
                vec![
                    int(module.instance_id),
                    text(self.sizes.fit("modules", "filename", &module.filename)),
                    text(self.sizes.fit("modules", "args", &module.args)),
                    boolean(module.loaded),
                    boolean(module.should_be_loaded),
                ],
            )
        } else {
            self.pool.execute(
                conn,
                Action::Modules.mask(),
                "DELETE FROM modules WHERE instance_id = ?1 AND filename = ?2".into(),
                vec![int(module.instance_id), text(module.filename)],
            )
        }
    }

    // =========================================================================
    // Host / service configuration
    // =========================================================================

    async fn process_host(&mut self, host: Host) -> Result<()> {
        if host.host_id == 0 {
            tracing::warn!(name = %host.name, "host event without id, skipped");
            return Ok(());
        }
        if host.enabled {
            self.caches
                .host_instance
                .insert(host.host_id, host.instance_id);
            self.caches
                .host_names
                .insert(host.host_id, host.name.clone());
        } else {
            self.caches.host_instance.remove(&host.host_id);
            self.caches.host_names.remove(&host.host_id);
        }
        self.shared
            .cached_hosts
            .store(self.caches.host_instance.len(), Ordering::Relaxed);

        let conn = self.pool.by_instance(host.instance_id);
        if self.config.store_in_hosts_services {
            self.pool.execute(
                conn,
                Action::Hosts.mask(),
                "INSERT INTO hosts (host_id,instance_id,name,alias,address,display_name,\
                 enabled,check_command,check_interval,retry_interval,max_check_attempts,\
                 check_period,active_checks,passive_checks,check_freshness,\
                 freshness_threshold,event_handler,event_handler_enabled,flap_detection,\
                 low_flap_threshold,high_flap_threshold,obsess_over_host,\
                 notification_interval,notification_period,notify,notes,notes_url,\
                 action_url,icon_image) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,\
                 ?19,?20,?21,?22,?23,?24,?25,?26,?27,?28,?29) \
                 ON CONFLICT(host_id) DO UPDATE SET instance_id=excluded.instance_id, \
                 name=excluded.name, alias=excluded.alias, address=excluded.address, \
                 display_name=excluded.display_name, enabled=excluded.enabled, \
                 check_command=excluded.check_command, \
                 check_interval=excluded.check_interval, \
                 retry_interval=excluded.retry_interval, \
                 max_check_attempts=excluded.max_check_attempts, \
                 check_period=excluded.check_period, \
                 active_checks=excluded.active_checks, \
                 passive_checks=excluded.passive_checks, \
                 check_freshness=excluded.check_freshness, \
                 freshness_threshold=excluded.freshness_threshold, \
                 event_handler=excluded.event_handler, \
                 event_handler_enabled=excluded.event_handler_enabled, \
                 flap_detection=excluded.flap_detection, \
                 low_flap_threshold=excluded.low_flap_threshold, \
                 high_flap_threshold=excluded.high_flap_threshold, \
                 obsess_over_host=excluded.obsess_over_host, \
                 notification_interval=excluded.notification_interval, \
                 notification_period=excluded.notification_period, \
                 notify=excluded.notify, notes=excluded.notes, \
                 notes_url=excluded.notes_url, action_url=excluded.action_url, \
                 icon_image=excluded.icon_image"
                    .into(),
                vec![
                    int(host.host_id),
                    int(host.instance_id),
                    text(self.sizes.fit("hosts", "name", &host.name)),
                    text(self.sizes.fit("hosts", "alias", &host.alias)),
                    text(self.sizes.fit("hosts", "address", &host.address)),
                    text(self.sizes.fit("hosts", "display_name", &host.display_name)),
                    boolean(host.enabled),
                    text(&host.check_command),
                    real(host.check_interval),
                    real(host.retry_interval),
                    int(host.max_check_attempts),
                    text(self.sizes.fit("hosts", "check_period", &host.check_period)),
                    boolean(host.active_checks_enabled),
                    boolean(host.passive_checks_enabled),
                    boolean(host.check_freshness),
                    real(host.freshness_threshold),
                    text(self.sizes.fit("hosts", "event_handler", &host.event_handler)),
                    boolean(host.event_handler_enabled),
                    boolean(host.flap_detection_enabled),
                    real(host.low_flap_threshold),
                    real(host.high_flap_threshold),
                    boolean(host.obsess_over),
                    real(host.notification_interval),
                    text(self.sizes.fit("hosts", "notification_period", &host.notification_period)),
                    boolean(host.notifications_enabled),
                    text(self.sizes.fit("hosts", "notes", &host.notes)),
                    text(self.sizes.fit("hosts", "notes_url", &host.notes_url)),
                    text(self.sizes.fit("hosts", "action_url", &host.action_url)),
                    text(self.sizes.fit("hosts", "icon_image", &host.icon_image)),
                ],
            )?;
        }

        if self.config.store_in_resources {
            if host.enabled {
                let resource_id = self
                    .upsert_resource(
                        host.host_id,
                        0,
                        0, // type host
                        host.instance_id,
                        &host.name,
                        "",
                        &host.address,
                        &host.alias,
                        host.severity_id,
                        host.notifications_enabled,
                        host.passive_checks_enabled,
                        host.active_checks_enabled,
                        host.max_check_attempts,
                        conn,
                    )
                    .await?;
                self.rewrite_resource_tags(resource_id, &host.tags, conn).await?;
            } else {
                self.disable_resource(host.host_id, 0, conn)?;
            }
        }
        Ok(())
    }

    async fn process_service(&mut self, service: Service) -> Result<()> {
        if service.host_id == 0 || service.service_id == 0 {
            tracing::warn!(
                description = %service.description,
                "service event without full key, skipped"
            );
            return Ok(());
        }
        let instance_id = self
            .caches
            .host_instance
            .get(&service.host_id)
            .copied()
            .unwrap_or(0);
        let conn = if instance_id != 0 {
            self.pool.by_instance(instance_id)
        } else {
            self.pool.best()
        };

        if self.config.store_in_hosts_services {
            self.pool.execute(
                conn,
                Action::Services.mask(),
                "INSERT INTO services (host_id,service_id,description,display_name,enabled,\
                 check_command,check_interval,retry_interval,max_check_attempts,check_period,\
                 active_checks,passive_checks,check_freshness,freshness_threshold,\
                 event_handler,event_handler_enabled,flap_detection,low_flap_threshold,\
                 high_flap_threshold,volatile,obsess_over_service,notification_interval,\
                 notification_period,notify,notes,notes_url,action_url,icon_image) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,\
                 ?19,?20,?21,?22,?23,?24,?25,?26,?27,?28) \
                 ON CONFLICT(host_id,service_id) DO UPDATE SET \
                 description=excluded.description, display_name=excluded.display_name, \
                 enabled=excluded.enabled, check_command=excluded.check_command, \
                 check_interval=excluded.check_interval, \
                 retry_interval=excluded.retry_interval, \
                 max_check_attempts=excluded.max_check_attempts, \
                 check_period=excluded.check_period, active_checks=excluded.active_checks, \
                 passive_checks=excluded.passive_checks, \
                 check_freshness=excluded.check_freshness, \
                 freshness_threshold=excluded.freshness_threshold, \
                 event_handler=excluded.event_handler, \
                 event_handler_enabled=excluded.event_handler_enabled, \
                 flap_detection=excluded.flap_detection, \
                 low_flap_threshold=excluded.low_flap_threshold, \
                 high_flap_threshold=excluded.high_flap_threshold, \
                 volatile=excluded.volatile, \
                 obsess_over_service=excluded.obsess_over_service, \
                 notification_interval=excluded.notification_interval, \
                 notification_period=excluded.notification_period, \
                 notify=excluded.notify, notes=excluded.notes, \
                 notes_url=excluded.notes_url, action_url=excluded.action_url, \
                 icon_image=excluded.icon_image"
                    .into(),
                vec![
                    int(service.host_id),
                    int(service.service_id),
                    text(self.sizes.fit("services", "description", &service.description)),
                    text(self.sizes.fit("services", "display_name", &service.display_name)),
                    boolean(service.enabled),
                    text(&service.check_command),
                    real(service.check_interval),
                    real(service.retry_interval),
                    int(service.max_check_attempts),
                    text(self.sizes.fit("services", "check_period", &service.check_period)),
                    boolean(service.active_checks_enabled),
                    boolean(service.passive_checks_enabled),
                    boolean(service.check_freshness),
                    real(service.freshness_threshold),
                    text(self.sizes.fit("services", "event_handler", &service.event_handler)),
                    boolean(service.event_handler_enabled),
                    boolean(service.flap_detection_enabled),
                    real(service.low_flap_threshold),
                    real(service.high_flap_threshold),
                    boolean(service.is_volatile),
                    boolean(service.obsess_over),
                    real(service.notification_interval),
                    text(self.sizes.fit("services", "notification_period", &service.notification_period)),
                    boolean(service.notifications_enabled),
                    text(self.sizes.fit("services", "notes", &service.notes)),
                    text(self.sizes.fit("services", "notes_url", &service.notes_url)),
                    text(self.sizes.fit("services", "action_url", &service.action_url)),
                    text(self.sizes.fit("services", "icon_image", &service.icon_image)),
                ],
            )?;
        }

        if self.config.store_in_resources {
            if service.enabled {
                let parent_name = self
                    .caches
                    .host_names
                    .get(&service.host_id)
                    .cloned()
                    .unwrap_or_default();
                let resource_id = self
                    .upsert_resource(
                        service.service_id,
                        service.host_id,
                        1, // type service
                        instance_id,
                        &service.description,
                        &parent_name,
                        "",
                        &service.display_name,
                        service.severity_id,
                        service.notifications_enabled,
                        service.passive_checks_enabled,
                        service.active_checks_enabled,
                        service.max_check_attempts,
                        conn,
                    )
                    .await?;
                self.rewrite_resource_tags(resource_id, &service.tags, conn).await?;
            } else {
                self.disable_resource(service.service_id, service.host_id, conn)?;
            }
        }
        Ok(())
    }

    /// Insert-or-update one `resources` row and return its surrogate
    #[allow(clippy::too_many_arguments)]
    async fn upsert_resource(
        &mut self,
        id: u32,
        parent_id: u32,
        resource_type: i64,
        poller_id: u32,
        name: &str,
        parent_name: &str,
        address: &str,
        alias: &str,
        severity_id: u64,
        notifications_enabled: bool,
        passive_checks_enabled: bool,
        active_checks_enabled: bool,
        max_check_attempts: i32,
        conn: usize,
    ) -> Result<u64> {
        let severity: Value = if severity_id == 0 {
            Value::Null
        } else {
            int(severity_id as i64)
        };

        if let Some(&resource_id) = self.caches.resources.get(&(id, parent_id)) {
            self.pool.execute(
                conn,
                Action::Resources.mask(),
                "UPDATE resources SET poller_id=?2, name=?3, parent_name=?4, address=?5, \
                 alias=?6, severity_id=?7, enabled=1, notifications_enabled=?8, \
                 passive_checks_enabled=?9, active_checks_enabled=?10, \
                 max_check_attempts=?11 WHERE resource_id=?1"
                    .into(),
                vec![
                    int(resource_id as i64),
                    int(poller_id),
                    text(self.sizes.fit("resources", "name", name)),
                    text(self.sizes.fit("resources", "parent_name", parent_name)),
                    text(self.sizes.fit("resources", "address", address)),
                    text(self.sizes.fit("resources", "alias", alias)),
                    severity,
                    boolean(notifications_enabled),
                    boolean(passive_checks_enabled),
                    boolean(active_checks_enabled),
                    int(max_check_attempts),
                ],
            )?;
            return Ok(resource_id);
        }

        // Cache miss: mint the row directly so the surrogate comes back.
        // Pending writes on this connection must be visible first.
        self.pool
            .finish_action(conn as i32, mask_of(&[Action::Hosts, Action::Services, Action::Resources]))
            .await?;
        let mut rows = self
            .conn
            .query(
                "INSERT INTO resources (id,parent_id,type,poller_id,name,parent_name,\
                 address,alias,severity_id,enabled,notifications_enabled,\
                 passive_checks_enabled,active_checks_enabled,max_check_attempts) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,1,?10,?11,?12,?13) \
                 ON CONFLICT(id,parent_id) DO UPDATE SET poller_id=excluded.poller_id, \
                 name=excluded.name, parent_name=excluded.parent_name, \
                 address=excluded.address, alias=excluded.alias, \
                 severity_id=excluded.severity_id, enabled=1 \
                 RETURNING resource_id",
                vec![
                    int(id),
                    int(parent_id),
                    int(resource_type),
                    int(poller_id),
                    text(self.sizes.fit("resources", "name", name)),
                    text(self.sizes.fit("resources", "parent_name", parent_name)),
                    text(self.sizes.fit("resources", "address", address)),
                    text(self.sizes.fit("resources", "alias", alias)),
                    severity,
                    boolean(notifications_enabled),
                    boolean(passive_checks_enabled),
                    boolean(active_checks_enabled),
                    int(max_check_attempts),
                ],
            )
            .await?;

        let resource_id = match rows.next().await? {
            Some(row) => {
                let raw: i64 = row.get(0)?;
                raw as u64
            }
            None => {
                // Fall back to a targeted SELECT before giving up.
                let mut rows = self
                    .conn
                    .query(
                        "SELECT resource_id FROM resources WHERE id = ?1 AND parent_id = ?2",
                        vec![int(id), int(parent_id)],
                    )
                    .await?;
                match rows.next().await? {
                    Some(row) => {
                        let raw: i64 = row.get(0)?;
                        raw as u64
                    }
                    None => {
                        tracing::error!(id, parent_id, "resource insert returned no id");
                        return Err(crate::PersistError::MissingId {
                            entity: "resource",
                            key: format!("({id},{parent_id})"),
                        });
                    }
                }
            }
        };
        self.caches.resources.insert((id, parent_id), resource_id);
        Ok(resource_id)
    }

    /// Delete and re-create the tag links of one resource
    async fn rewrite_resource_tags(
        &mut self,
        resource_id: u64,
        tags: &[vigil_protocol::TagRef],
        conn: usize,
    ) -> Result<()> {
        self.pool.execute(
            conn,
            Action::ResourcesTags.mask(),
            "DELETE FROM resources_tags WHERE resource_id = ?1".into(),
            vec![int(resource_id as i64)],
        )?;
        for tag in tags {
            let surrogate = match self.caches.tags.get(&(tag.id, tag.kind.as_u32())) {
                Some(&s) => s,
                None => {
                    // Tag definition not seen yet: mint a placeholder row.
                    self.ensure_tag(tag.id, tag.kind.as_u32(), "").await?
                }
            };
            self.pool.execute(
                conn,
                Action::ResourcesTags.mask(),
                "INSERT OR IGNORE INTO resources_tags (tag_id,resource_id) VALUES (?1,?2)".into(),
                vec![int(surrogate as i64), int(resource_id as i64)],
            )?;
        }
        Ok(())
    }

    fn disable_resource(&mut self, id: u32, parent_id: u32, conn: usize) -> Result<()> {
        if let Some(resource_id) = self.caches.resources.remove(&(id, parent_id)) {
            self.pool.execute(
                conn,
                Action::Resources.mask(),
                "UPDATE resources SET enabled = 0 WHERE resource_id = ?1".into(),
                vec![int(resource_id as i64)],
            )?;
        }
        Ok(())
    }

    async fn process_adaptive_host(&mut self, adaptive: AdaptiveHost) -> Result<()> {
        let mut sets: Vec<String> = Vec::new();
        let mut params: Vec<Value> = vec![int(adaptive.host_id)];
        let mut bind = |sets: &mut Vec<String>, params: &mut Vec<Value>, col: &str, v: Value| {
            params.push(v);
            sets.push(format!("{col}=?{}", params.len()));
        };

        if let Some(v) = adaptive.notifications_enabled {
            bind(&mut sets, &mut params, "notify", boolean(v));
        }
        if let Some(v) = adaptive.active_checks_enabled {
            bind(&mut sets, &mut params, "active_checks", boolean(v));
        }
        if let Some(v) = adaptive.passive_checks_enabled {
            bind(&mut sets, &mut params, "passive_checks", boolean(v));
        }
        if let Some(v) = adaptive.event_handler_enabled {
            bind(&mut sets, &mut params, "event_handler_enabled", boolean(v));
        }
        if let Some(v) = adaptive.flap_detection_enabled {
            bind(&mut sets, &mut params, "flap_detection", boolean(v));
        }
        if let Some(v) = adaptive.obsess_over {
            bind(&mut sets, &mut params, "obsess_over_host", boolean(v));
        }
        if let Some(v) = adaptive.check_freshness {
            bind(&mut sets, &mut params, "check_freshness", boolean(v));
        }
        if let Some(v) = adaptive.check_interval {
            bind(&mut sets, &mut params, "check_interval", real(v));
        }
        if let Some(v) = adaptive.retry_interval {
            bind(&mut sets, &mut params, "retry_interval", real(v));
        }
        if let Some(v) = adaptive.max_check_attempts {
            bind(&mut sets, &mut params, "max_check_attempts", int(v));
        }
        if let Some(v) = &adaptive.check_command {
            bind(&mut sets, &mut params, "check_command", text(v));
        }
        if let Some(v) = &adaptive.check_period {
            bind(&mut sets, &mut params, "check_period", text(v));
        }
        if let Some(v) = &adaptive.event_handler {
            bind(&mut sets, &mut params, "event_handler", text(v));
        }

        if sets.is_empty() {
            return Ok(());
        }
        let conn = self.conn_for_host(adaptive.host_id);
        self.pool.execute(
            conn,
            Action::Hosts.mask(),
            format!("UPDATE hosts SET {} WHERE host_id=?1", sets.join(",")),
            params,
        )
    }

    async fn process_adaptive_service(&mut self, adaptive: AdaptiveService) -> Result<()> {
        let mut sets: Vec<String> = Vec::new();
        let mut params: Vec<Value> = vec![int(adaptive.host_id), int(adaptive.service_id)];
        let mut bind = |sets: &mut Vec<String>, params: &mut Vec<Value>, col: &str, v: Value| {
            params.push(v);
            sets.push(format!("{col}=?{}", params.len()));
        };

        if let Some(v) = adaptive.notifications_enabled {
            bind(&mut sets, &mut params, "notify", boolean(v));
        }
        if let Some(v) = adaptive.active_checks_enabled {
            bind(&mut sets, &mut params, "active_checks", boolean(v));
        }
        if let Some(v) = adaptive.passive_checks_enabled {
            bind(&mut sets, &mut params, "passive_checks", boolean(v));
        }
        if let Some(v) = adaptive.event_handler_enabled {
            bind(&mut sets, &mut params, "event_handler_enabled", boolean(v));
        }
        if let Some(v) = adaptive.flap_detection_enabled {
            bind(&mut sets, &mut params, "flap_detection", boolean(v));
        }
        if let Some(v) = adaptive.obsess_over {
            bind(&mut sets, &mut params, "obsess_over_service", boolean(v));
        }
        if let Some(v) = adaptive.check_freshness {
            bind(&mut sets, &mut params, "check_freshness", boolean(v));
        }
        if let Some(v) = adaptive.is_volatile {
            bind(&mut sets, &mut params, "volatile", boolean(v));
        }
        if let Some(v) = adaptive.check_interval {
            bind(&mut sets, &mut params, "check_interval", real(v));
        }
        if let Some(v) = adaptive.retry_interval {
            bind(&mut sets, &mut params, "retry_interval", real(v));
        }
        if let Some(v) = adaptive.max_check_attempts {
            bind(&mut sets, &mut params, "max_check_attempts", int(v));
        }
        if let Some(v) = &adaptive.check_command {
            bind(&mut sets, &mut params, "check_command", text(v));
        }
        if let Some(v) = &adaptive.check_period {
            bind(&mut sets, &mut params, "check_period", text(v));
        }
        if let Some(v) = &adaptive.event_handler {
            bind(&mut sets, &mut params, "event_handler", text(v));
        }

        if sets.is_empty() {
            return Ok(());
        }
        let conn = self.conn_for_host(adaptive.host_id);
        self.pool.execute(
            conn,
            Action::Services.mask(),
            format!(
                "UPDATE services SET {} WHERE host_id=?1 AND service_id=?2",
                sets.join(",")
            ),
            params,
        )
    }

    // =========================================================================
    // Checks and statuses
    // =========================================================================

    /// Active results scheduled far in the past are stale and droppable
    fn is_stale(check_type: i16, next_check: i64, now: i64) -> bool {
        !(check_type != 0 || next_check >= now - STALE_STATUS_WINDOW_SECS || next_check == 0)
    }

    async fn process_host_check(&mut self, check: HostCheck) -> Result<()> {
        let now = now_epoch();
        if Self::is_stale(check.check_type, check.next_check, now) {
            self.note_stale("host_check", check.host_id, 0, check.next_check, now);
            return Ok(());
        }
        let hash = hash_command(&check.command_line);
        if self.caches.host_commands.get(&check.host_id) == Some(&hash) {
            return Ok(());
        }
        self.caches.host_commands.insert(check.host_id, hash);
        let conn = self.conn_for_host(check.host_id);
        self.pool.execute(
            conn,
            Action::Hosts.mask(),
            "UPDATE hosts SET command_line = ?2 WHERE host_id = ?1".into(),
            vec![int(check.host_id), text(check.command_line)],
        )
    }

    async fn process_service_check(&mut self, check: ServiceCheck) -> Result<()> {
        let now = now_epoch();
        if Self::is_stale(check.check_type, check.next_check, now) {
            self.note_stale(
                "service_check",
                check.host_id,
                check.service_id,
                check.next_check,
                now,
            );
            return Ok(());
        }
        let hash = hash_command(&check.command_line);
        let key = (check.host_id, check.service_id);
        if self.caches.service_commands.get(&key) == Some(&hash) {
            return Ok(());
        }
        self.caches.service_commands.insert(key, hash);
        let conn = self.conn_for_host(check.host_id);
        self.pool.execute(
            conn,
            Action::Services.mask(),
            "UPDATE services SET command_line = ?3 WHERE host_id = ?1 AND service_id = ?2".into(),
            vec![
                int(check.host_id),
                int(check.service_id),
                text(check.command_line),
            ],
        )
    }

    async fn process_host_status(&mut self, status: HostStatus) -> Result<()> {
        let now = now_epoch();
        if Self::is_stale(status.check_type, status.next_check, now) {
            self.note_stale("host_status", status.host_id, 0, status.next_check, now);
            return Ok(());
        }
        let conn = self.conn_for_host(status.host_id);

        if self.config.store_in_hosts_services {
            self.pool.execute(
                conn,
                Action::Hosts.mask(),
                "UPDATE hosts SET checked=?2, check_type=?3, state=?4, state_type=?5, \
                 check_attempt=?6, last_check=?7, next_check=?8, last_state_change=?9, \
                 last_hard_state=?10, last_hard_state_change=?11, last_time_up=?12, \
                 last_time_down=?13, last_time_unreachable=?14, output=?15, perfdata=?16, \
                 flapping=?17, percent_state_change=?18, latency=?19, execution_time=?20, \
                 acknowledged=?21, acknowledgement_type=?22, scheduled_downtime_depth=?23, \
                 should_be_scheduled=?24, notification_number=?25, last_notification=?26, \
                 next_host_notification=?27, no_more_notifications=?28 \
                 WHERE host_id=?1"
                    .into(),
                vec![
                    int(status.host_id),
                    boolean(status.checked),
                    int(status.check_type),
                    int(status.current_state),
                    int(status.state_type),
                    int(status.current_check_attempt),
                    int(status.last_check),
                    int(status.next_check),
                    int(status.last_state_change),
                    int(status.last_hard_state),
                    int(status.last_hard_state_change),
                    int(status.last_time_up),
                    int(status.last_time_down),
                    int(status.last_time_unreachable),
                    text(&status.output),
                    text(&status.perfdata),
                    boolean(status.flapping),
                    real(status.percent_state_change),
                    real(status.latency),
                    real(status.execution_time),
                    boolean(status.acknowledged),
                    int(status.acknowledgement_type),
                    int(status.scheduled_downtime_depth),
                    boolean(status.should_be_scheduled),
                    int(status.notification_number),
                    int(status.last_notification),
                    int(status.next_notification),
                    boolean(status.no_more_notifications),
                ],
            )?;
        }

        if self.config.store_in_resources
            && let Some(&resource_id) = self.caches.resources.get(&(status.host_id, 0))
        {
            self.pool.execute(
                conn,
                Action::Resources.mask(),
                "UPDATE resources SET status=?2, status_ordered=?2, \
                 status_confirmed=?3, check_attempts=?4, in_downtime=?5, acknowledged=?6, \
                 last_check_type=?7, last_check=?8, last_status_change=?9, output=?10, \
                 has_graph=?11 WHERE resource_id=?1"
                    .into(),
                vec![
                    int(resource_id as i64),
                    int(status.current_state),
                    boolean(status.state_type == 1),
                    int(status.current_check_attempt),
                    boolean(status.scheduled_downtime_depth > 0),
                    boolean(status.acknowledged),
                    int(status.check_type),
                    int(status.last_check),
                    int(status.last_state_change),
                    text(&status.output),
                    boolean(!status.perfdata.is_empty()),
                ],
            )?;
        }
        Ok(())
    }

    async fn process_service_status(&mut self, status: ServiceStatus) -> Result<()> {
        let now = now_epoch();
        if Self::is_stale(status.check_type, status.next_check, now) {
            self.note_stale(
                "service_status",
                status.host_id,
                status.service_id,
                status.next_check,
                now,
            );
            return Ok(());
        }
        let conn = self.conn_for_host(status.host_id);

        if self.config.store_in_hosts_services {
            self.pool.execute(
                conn,
                Action::Services.mask(),
                "UPDATE services SET checked=?3, check_type=?4, state=?5, state_type=?6, \
                 check_attempt=?7, last_check=?8, next_check=?9, check_interval=?10, \
                 last_state_change=?11, last_hard_state=?12, last_hard_state_change=?13, \
                 last_time_ok=?14, last_time_warning=?15, last_time_critical=?16, \
                 last_time_unknown=?17, output=?18, perfdata=?19, flapping=?20, \
                 percent_state_change=?21, latency=?22, execution_time=?23, \
                 acknowledged=?24, acknowledgement_type=?25, scheduled_downtime_depth=?26, \
                 should_be_scheduled=?27, notification_number=?28, last_notification=?29, \
                 next_notification=?30, no_more_notifications=?31 \
                 WHERE host_id=?1 AND service_id=?2"
                    .into(),
                vec![
                    int(status.host_id),
                    int(status.service_id),
                    boolean(status.checked),
                    int(status.check_type),
                    int(status.current_state),
                    int(status.state_type),
                    int(status.current_check_attempt),
                    int(status.last_check),
                    int(status.next_check),
                    real(status.check_interval),
                    int(status.last_state_change),
                    int(status.last_hard_state),
                    int(status.last_hard_state_change),
                    int(status.last_time_ok),
                    int(status.last_time_warning),
                    int(status.last_time_critical),
                    int(status.last_time_unknown),
                    text(&status.output),
                    text(&status.perfdata),
                    boolean(status.flapping),
                    real(status.percent_state_change),
                    real(status.latency),
                    real(status.execution_time),
                    boolean(status.acknowledged),
                    int(status.acknowledgement_type),
                    int(status.scheduled_downtime_depth),
                    boolean(status.should_be_scheduled),
                    int(status.notification_number),
                    int(status.last_notification),
                    int(status.next_notification),
                    boolean(status.no_more_notifications),
                ],
            )?;
        }

        if self.config.store_in_resources
            && let Some(&resource_id) = self
                .caches
                .resources
                .get(&(status.service_id, status.host_id))
        {
            self.pool.execute(
                conn,
                Action::Resources.mask(),
                "UPDATE resources SET status=?2, status_ordered=?2, \
                 status_confirmed=?3, check_attempts=?4, in_downtime=?5, acknowledged=?6, \
                 last_check_type=?7, last_check=?8, last_status_change=?9, output=?10, \
                 has_graph=?11 WHERE resource_id=?1"
                    .into(),
                vec![
                    int(resource_id as i64),
                    int(status.current_state),
                    boolean(status.state_type == 1),
                    int(status.current_check_attempt),
                    boolean(status.scheduled_downtime_depth > 0),
                    boolean(status.acknowledged),
                    int(status.check_type),
                    int(status.last_check),
                    int(status.last_state_change),
                    text(&status.output),
                    boolean(!status.perfdata.is_empty()),
                ],
            )?;
        }

        self.process_perfdata(&status, conn).await
    }

    fn note_stale(&self, kind: &str, host_id: u32, service_id: u32, next_check: i64, now: i64) {
        self.shared
            .stale_status_dropped
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            kind,
            host_id,
            service_id,
            next_check,
            now,
            "stale status dropped"
        );
    }

    // =========================================================================
    // Perfdata pipeline
    // =========================================================================

    async fn process_perfdata(&mut self, status: &ServiceStatus, conn: usize) -> Result<()> {
        if status.perfdata.is_empty() {
            return Ok(());
        }
        let key = (status.host_id, status.service_id);
        // index_data holds the interval in check units; the RRD events get
        // seconds.
        let interval = status.check_interval.round() as u32;
        let interval_secs = interval * self.config.interval_length;

        let index = match self.caches.indexes.get(&key) {
            Some(info) => *info,
            None => {
                let info = self.create_index(status, interval, conn).await?;
                self.caches.indexes.insert(key, info);
                self.shared
                    .cached_indexes
                    .store(self.caches.indexes.len(), Ordering::Relaxed);
                self.publish_derived(Event::new(
                    types::PB_INDEX_MAPPING,
                    Payload::IndexMapping(IndexMapping {
                        index_id: info.index_id,
                        host_id: status.host_id,
                        service_id: status.service_id,
                    }),
                ));
                info
            }
        };

        if index.interval != interval {
            self.pool.execute(
                conn,
                Action::Metrics.mask(),
                "UPDATE index_data SET check_interval = ?2 WHERE id = ?1".into(),
                vec![int(index.index_id as i64), int(interval)],
            )?;
            if let Some(info) = self.caches.indexes.get_mut(&key) {
                info.interval = interval;
            }
        }

        for metric in parse_perfdata(&status.perfdata) {
            let metric_key = (index.index_id, metric.name.clone());
            let info = match self.caches.metrics.get(&metric_key) {
                Some(info) => {
                    let mut info = info.clone();
                    if info.unit != metric.unit
                        || info.warn != metric.warn
                        || info.crit != metric.crit
                        || info.min != metric.min
                        || info.max != metric.max
                    {
                        self.pool.execute(
                            conn,
                            Action::Metrics.mask(),
                            "UPDATE metrics SET unit_name=?2, warn=?3, crit=?4, min=?5, \
                             max=?6, current_value=?7 WHERE metric_id=?1"
                                .into(),
                            vec![
                                int(info.metric_id as i64),
                                text(self.sizes.fit("metrics", "unit_name", &metric.unit)),
                                opt_real(metric.warn),
                                opt_real(metric.crit),
                                opt_real(metric.min),
                                opt_real(metric.max),
                                real(metric.value),
                            ],
                        )?;
                        info.unit = metric.unit.clone();
                        info.warn = metric.warn;
                        info.crit = metric.crit;
                        info.min = metric.min;
                        info.max = metric.max;
                        self.caches.metrics.insert(metric_key.clone(), info.clone());
                    }
                    info
                }
                None => {
                    let info = self.create_metric(index.index_id, &metric).await?;
                    self.caches.metrics.insert(metric_key, info.clone());
                    self.shared
                        .cached_metrics
                        .store(self.caches.metrics.len(), Ordering::Relaxed);
                    self.publish_derived(Event::new(
                        types::PB_METRIC_MAPPING,
                        Payload::MetricMapping(MetricMapping {
                            index_id: index.index_id,
                            metric_id: info.metric_id,
                        }),
                    ));
                    info
                }
            };

            if self.config.store_in_data_bin {
                self.pool.execute(
                    conn,
                    Action::Metrics.mask(),
                    "INSERT INTO data_bin (id_metric,ctime,value,status) VALUES (?1,?2,?3,?4)"
                        .into(),
                    vec![
                        int(info.metric_id as i64),
                        int(status.last_check),
                        real(metric.value),
                        int(status.current_state),
                    ],
                )?;
            }

            self.publish_derived(Event::new(
                types::PB_METRIC,
                Payload::Metric(Metric {
                    time: status.last_check,
                    interval: interval_secs,
                    metric_id: info.metric_id,
                    name: metric.name,
                    rrd_len: index.rrd_retention,
                    value: metric.value,
                    value_type: metric.value_type as i16,
                    host_id: status.host_id,
                    service_id: status.service_id,
                }),
            ));
        }

        self.publish_derived(Event::new(
            types::PB_STATUS,
            Payload::PerfStatus(PerfStatus {
                time: status.last_check,
                index_id: index.index_id,
                interval: interval_secs,
                rrd_len: index.rrd_retention,
                state: status.current_state,
            }),
        ));
        Ok(())
    }

    /// Mint the `index_data` row for a `(host, service)` pair
    async fn create_index(
        &mut self,
        status: &ServiceStatus,
        interval: u32,
        conn: usize,
    ) -> Result<IndexInfo> {
        let host_name = self
            .caches
            .host_names
            .get(&status.host_id)
            .cloned()
            .unwrap_or_default();
        let special = host_name.starts_with("_Module_");

        self.pool
            .finish_action(conn as i32, mask_of(&[Action::Services, Action::Metrics]))
            .await?;
        let mut rows = self
            .conn
            .query(
                "INSERT INTO index_data (host_id,service_id,host_name,check_interval,\
                 rrd_retention,special) VALUES (?1,?2,?3,?4,?5,?6) \
                 ON CONFLICT(host_id,service_id) DO UPDATE SET host_name=excluded.host_name, \
                 check_interval=excluded.check_interval \
                 RETURNING id",
                vec![
                    int(status.host_id),
                    int(status.service_id),
                    text(self.sizes.fit("index_data", "host_name", &host_name)),
                    int(interval),
                    int(self.config.rrd_len),
                    boolean(special),
                ],
            )
            .await?;
        let index_id = match rows.next().await? {
            Some(row) => {
                let raw: i64 = row.get(0)?;
                raw as u64
            }
            None => {
                return Err(crate::PersistError::MissingId {
                    entity: "index",
                    key: format!("({},{})", status.host_id, status.service_id),
                });
            }
        };
        tracing::info!(
            host_id = status.host_id,
            service_id = status.service_id,
            index_id,
            special,
            "index created"
        );
        Ok(IndexInfo {
            index_id,
            rrd_retention: self.config.rrd_len,
            interval,
            special,
            locked: false,
        })
    }

    /// Mint the `metrics` row for an `(index, metric_name)` pair
    async fn create_metric(
        &mut self,
        index_id: u64,
        metric: &crate::perfdata::PerfMetric,
    ) -> Result<MetricInfo> {
        let mut rows = self
            .conn
            .query(
                "INSERT INTO metrics (index_id,metric_name,unit_name,warn,crit,min,max,\
                 current_value,data_source_type) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9) \
                 ON CONFLICT(index_id,metric_name) DO UPDATE SET \
                 unit_name=excluded.unit_name, current_value=excluded.current_value \
                 RETURNING metric_id",
                vec![
                    int(index_id as i64),
                    text(self.sizes.fit("metrics", "metric_name", &metric.name)),
                    text(self.sizes.fit("metrics", "unit_name", &metric.unit)),
                    opt_real(metric.warn),
                    opt_real(metric.crit),
                    opt_real(metric.min),
                    opt_real(metric.max),
                    real(metric.value),
                    int(metric.value_type as i64),
                ],
            )
            .await?;
        let metric_id = match rows.next().await? {
            Some(row) => {
                let raw: i64 = row.get(0)?;
                raw as u64
            }
            None => {
                return Err(crate::PersistError::MissingId {
                    entity: "metric",
                    key: format!("({index_id},{})", metric.name),
                });
            }
        };
        tracing::debug!(index_id, metric = %metric.name, metric_id, "metric created");
        Ok(MetricInfo {
            metric_id,
            unit: metric.unit.clone(),
            warn: metric.warn,
            crit: metric.crit,
            min: metric.min,
            max: metric.max,
            value_type: metric.value_type as i16,
        })
    }

    fn publish_derived(&self, event: Event) {
        match self.engine.publish(&event) {
            Ok(()) => {
                self.shared.derived_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::debug!(error = %e, "derived event not published");
            }
        }
    }

    // =========================================================================
    // Staged kinds
    // =========================================================================

    fn process_comment(&mut self, comment: Comment) -> Result<()> {
        self.queues.push_comment(comment);
        Ok(())
    }

    fn process_downtime(&mut self, downtime: Downtime) -> Result<()> {
        self.queues.push_downtime(downtime);
        Ok(())
    }

    fn process_custom_variable(&mut self, cv: CustomVariable) -> Result<()> {
        if cv.enabled {
            self.queues.push_custom_variable(cv);
        } else {
            // Disabled definitions are removed outright.
            let conn = self.pool.special(SpecialConn::CustomVariable);
            self.pool.execute(
                conn,
                Action::CustomVariables.mask(),
                "DELETE FROM customvariables WHERE host_id=?1 AND service_id=?2 AND name=?3"
                    .into(),
                vec![int(cv.host_id), int(cv.service_id), text(cv.name)],
            )?;
        }
        Ok(())
    }

    fn process_custom_variable_status(&mut self, cvs: CustomVariableStatus) -> Result<()> {
        self.queues.push_custom_variable_status(cvs);
        Ok(())
    }

    fn process_log(&mut self, log: LogEntry) -> Result<()> {
        self.queues.push_log(log);
        Ok(())
    }

    // =========================================================================
    // Referential and relational kinds
    // =========================================================================

    async fn process_acknowledgement(&mut self, ack: Acknowledgement) -> Result<()> {
        let conn = self.pool.special(SpecialConn::Acknowledgement);
        self.pool.execute(
            conn,
            Action::Acknowledgements.mask(),
            "INSERT INTO acknowledgements (entry_time,host_id,service_id,instance_id,author,\
             comment_data,deletion_time,type,state,sticky,notify_contacts,persistent_comment) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12) \
             ON CONFLICT(entry_time,host_id,service_id) DO UPDATE SET \
             deletion_time=excluded.deletion_time, state=excluded.state, \
             sticky=excluded.sticky, notify_contacts=excluded.notify_contacts, \
             persistent_comment=excluded.persistent_comment"
                .into(),
            vec![
                int(ack.entry_time),
                int(ack.host_id),
                int(ack.service_id),
                int(ack.instance_id),
                text(self.sizes.fit("acknowledgements", "author", &ack.author)),
                text(&ack.comment),
                int(ack.deletion_time),
                int(ack.acknowledgement_type),
                int(ack.state),
                boolean(ack.is_sticky),
                boolean(ack.notify_contacts),
                boolean(ack.persistent_comment),
            ],
        )
    }

    async fn process_host_parent(&mut self, parent: HostParent) -> Result<()> {
        let conn = self.pool.special(SpecialConn::HostParent);
        if parent.enabled {
            self.pool.execute(
                conn,
                Action::HostParents.mask(),
                "INSERT OR IGNORE INTO hosts_hosts_parents (child_id,parent_id) VALUES (?1,?2)"
                    .into(),
                vec![int(parent.child_id), int(parent.parent_id)],
            )
        } else {
            self.pool.execute(
                conn,
                Action::HostParents.mask(),
                "DELETE FROM hosts_hosts_parents WHERE child_id=?1 AND parent_id=?2".into(),
                vec![int(parent.child_id), int(parent.parent_id)],
            )
        }
    }

    async fn process_host_dependency(&mut self, dep: HostDependency) -> Result<()> {
        let conn = self.pool.special(SpecialConn::HostDependency);
        if dep.enabled {
            self.pool.execute(
                conn,
                Action::HostDependencies.mask(),
                "INSERT INTO hosts_hosts_dependencies (host_id,dependent_host_id,\
                 dependency_period,execution_failure_options,notification_failure_options,\
                 inherits_parent) VALUES (?1,?2,?3,?4,?5,?6) \
                 ON CONFLICT(host_id,dependent_host_id) DO UPDATE SET \
                 dependency_period=excluded.dependency_period, \
                 execution_failure_options=excluded.execution_failure_options, \
                 notification_failure_options=excluded.notification_failure_options, \
                 inherits_parent=excluded.inherits_parent"
                    .into(),
                vec![
                    int(dep.host_id),
                    int(dep.dependent_host_id),
                    text(&dep.dependency_period),
                    text(&dep.execution_failure_options),
                    text(&dep.notification_failure_options),
                    boolean(dep.inherits_parent),
                ],
            )
        } else {
            self.pool.execute(
                conn,
                Action::HostDependencies.mask(),
                "DELETE FROM hosts_hosts_dependencies WHERE host_id=?1 AND dependent_host_id=?2"
                    .into(),
                vec![int(dep.host_id), int(dep.dependent_host_id)],
            )
        }
    }

    async fn process_service_dependency(&mut self, dep: ServiceDependency) -> Result<()> {
        let conn = self.pool.special(SpecialConn::ServiceDependency);
        if dep.enabled {
            self.pool.execute(
                conn,
                Action::ServiceDependencies.mask(),
                "INSERT INTO services_services_dependencies (host_id,service_id,\
                 dependent_host_id,dependent_service_id,dependency_period,\
                 execution_failure_options,notification_failure_options,inherits_parent) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8) \
                 ON CONFLICT(host_id,service_id,dependent_host_id,dependent_service_id) \
                 DO UPDATE SET dependency_period=excluded.dependency_period, \
                 execution_failure_options=excluded.execution_failure_options, \
                 notification_failure_options=excluded.notification_failure_options, \
                 inherits_parent=excluded.inherits_parent"
                    .into(),
                vec![
                    int(dep.host_id),
                    int(dep.service_id),
                    int(dep.dependent_host_id),
                    int(dep.dependent_service_id),
                    text(&dep.dependency_period),
                    text(&dep.execution_failure_options),
                    text(&dep.notification_failure_options),
                    boolean(dep.inherits_parent),
                ],
            )
        } else {
            self.pool.execute(
                conn,
                Action::ServiceDependencies.mask(),
                "DELETE FROM services_services_dependencies WHERE host_id=?1 AND \
                 service_id=?2 AND dependent_host_id=?3 AND dependent_service_id=?4"
                    .into(),
                vec![
                    int(dep.host_id),
                    int(dep.service_id),
                    int(dep.dependent_host_id),
                    int(dep.dependent_service_id),
                ],
            )
        }
    }

    async fn process_host_group(&mut self, group: HostGroup) -> Result<()> {
        let conn = self.pool.special(SpecialConn::HostGroup);
        if group.enabled {
            self.caches.hostgroups.insert(group.hostgroup_id);
            self.pool.execute(
                conn,
                Action::HostGroups.mask(),
                "INSERT INTO hostgroups (hostgroup_id,name) VALUES (?1,?2) \
                 ON CONFLICT(hostgroup_id) DO UPDATE SET name=excluded.name"
                    .into(),
                vec![
                    int(group.hostgroup_id),
                    text(self.sizes.fit("hostgroups", "name", &group.name)),
                ],
            )
        } else {
            self.caches.hostgroups.remove(&group.hostgroup_id);
            self.pool.execute(
                conn,
                Action::HostGroups.mask(),
                "DELETE FROM hosts_hostgroups WHERE hostgroup_id = ?1".into(),
                vec![int(group.hostgroup_id)],
            )?;
            self.pool.execute(
                conn,
                Action::HostGroups.mask(),
                "DELETE FROM hostgroups WHERE hostgroup_id = ?1".into(),
                vec![int(group.hostgroup_id)],
            )
        }
    }

    async fn process_host_group_member(&mut self, member: HostGroupMember) -> Result<()> {
        let conn = self.pool.special(SpecialConn::HostGroup);
        if member.enabled {
            if !self.caches.hostgroups.contains(&member.hostgroup_id) {
                tracing::warn!(
                    hostgroup_id = member.hostgroup_id,
                    host_id = member.host_id,
                    "membership for unknown host group"
                );
            }
            self.pool.execute(
                conn,
                Action::HostGroups.mask(),
                "INSERT OR IGNORE INTO hosts_hostgroups (host_id,hostgroup_id) VALUES (?1,?2)"
                    .into(),
                vec![int(member.host_id), int(member.hostgroup_id)],
            )
        } else {
            self.pool.execute(
                conn,
                Action::HostGroups.mask(),
                "DELETE FROM hosts_hostgroups WHERE host_id=?1 AND hostgroup_id=?2".into(),
                vec![int(member.host_id), int(member.hostgroup_id)],
            )
        }
    }

    async fn process_service_group(&mut self, group: ServiceGroup) -> Result<()> {
        let conn = self.pool.special(SpecialConn::ServiceGroup);
        if group.enabled {
            self.caches.servicegroups.insert(group.servicegroup_id);
            self.pool.execute(
                conn,
                Action::ServiceGroups.mask(),
                "INSERT INTO servicegroups (servicegroup_id,name) VALUES (?1,?2) \
                 ON CONFLICT(servicegroup_id) DO UPDATE SET name=excluded.name"
                    .into(),
                vec![
                    int(group.servicegroup_id),
                    text(self.sizes.fit("servicegroups", "name", &group.name)),
                ],
            )
        } else {
            self.caches.servicegroups.remove(&group.servicegroup_id);
            self.pool.execute(
                conn,
                Action::ServiceGroups.mask(),
                "DELETE FROM services_servicegroups WHERE servicegroup_id = ?1".into(),
                vec![int(group.servicegroup_id)],
            )?;
            self.pool.execute(
                conn,
                Action::ServiceGroups.mask(),
                "DELETE FROM servicegroups WHERE servicegroup_id = ?1".into(),
                vec![int(group.servicegroup_id)],
            )
        }
    }

    async fn process_service_group_member(&mut self, member: ServiceGroupMember) -> Result<()> {
        let conn = self.pool.special(SpecialConn::ServiceGroup);
        if member.enabled {
            self.pool.execute(
                conn,
                Action::ServiceGroups.mask(),
                "INSERT OR IGNORE INTO services_servicegroups \
                 (host_id,service_id,servicegroup_id) VALUES (?1,?2,?3)"
                    .into(),
                vec![
                    int(member.host_id),
                    int(member.service_id),
                    int(member.servicegroup_id),
                ],
            )
        } else {
            self.pool.execute(
                conn,
                Action::ServiceGroups.mask(),
                "DELETE FROM services_servicegroups WHERE host_id=?1 AND service_id=?2 \
                 AND servicegroup_id=?3"
                    .into(),
                vec![
                    int(member.host_id),
                    int(member.service_id),
                    int(member.servicegroup_id),
                ],
            )
        }
    }

    async fn process_severity(&mut self, severity: Severity) -> Result<()> {
        match severity.action {
            RefAction::Add | RefAction::Modify => {
                let conn = self.pool.special(SpecialConn::Severity);
                self.pool
                    .finish_action(conn as i32, Action::Severities.mask())
                    .await?;
                let mut rows = self
                    .conn
                    .query(
                        "INSERT INTO severities (id,type,name,level,icon_id) \
                         VALUES (?1,?2,?3,?4,?5) \
                         ON CONFLICT(id,type) DO UPDATE SET name=excluded.name, \
                         level=excluded.level, icon_id=excluded.icon_id \
                         RETURNING severity_id",
                        vec![
                            int(severity.id as i64),
                            int(severity.severity_type),
                            text(self.sizes.fit("severities", "name", &severity.name)),
                            int(severity.level),
                            int(severity.icon_id as i64),
                        ],
                    )
                    .await?;
                if let Some(row) = rows.next().await? {
                    let surrogate: i64 = row.get(0)?;
                    self.caches
                        .severities
                        .insert((severity.id, severity.severity_type), surrogate as u64);
                }
                Ok(())
            }
            RefAction::Delete => {
                // Deliberate no-op: rows referenced by resources stay.
                tracing::debug!(id = severity.id, "severity delete ignored");
                Ok(())
            }
        }
    }

    async fn process_tag(&mut self, tag: Tag) -> Result<()> {
        match tag.action {
            RefAction::Add | RefAction::Modify => {
                self.ensure_tag(tag.id, tag.kind.as_u32(), &tag.name).await?;
                Ok(())
            }
            RefAction::Delete => {
                let conn = self.pool.special(SpecialConn::Tag);
                self.caches.tags.remove(&(tag.id, tag.kind.as_u32()));
                self.pool.execute(
                    conn,
                    Action::Tags.mask(),
                    "DELETE FROM tags WHERE id = ?1 AND type = ?2".into(),
                    vec![int(tag.id as i64), int(tag.kind.as_u32())],
                )
            }
        }
    }

    /// Upsert one tag row and return its surrogate
    async fn ensure_tag(&mut self, id: u64, kind: u32, name: &str) -> Result<u64> {
        if let Some(&surrogate) = self.caches.tags.get(&(id, kind)) {
            return Ok(surrogate);
        }
        let conn = self.pool.special(SpecialConn::Tag);
        self.pool
            .finish_action(conn as i32, Action::Tags.mask())
            .await?;
        let mut rows = self
            .conn
            .query(
                "INSERT INTO tags (id,type,name) VALUES (?1,?2,?3) \
                 ON CONFLICT(id,type) DO UPDATE SET name = CASE \
                 WHEN excluded.name != '' THEN excluded.name ELSE tags.name END \
                 RETURNING tag_id",
                vec![
                    int(id as i64),
                    int(kind),
                    text(self.sizes.fit("tags", "name", name)),
                ],
            )
            .await?;
        match rows.next().await? {
            Some(row) => {
                let surrogate: i64 = row.get(0)?;
                self.caches.tags.insert((id, kind), surrogate as u64);
                Ok(surrogate as u64)
            }
            None => Err(crate::PersistError::MissingId {
                entity: "tag",
                key: format!("({id},{kind})"),
            }),
        }
    }

    async fn process_remove_graph(&mut self, remove: RemoveGraph) -> Result<()> {
        let conn = self.pool.special(SpecialConn::Log);
        if remove.is_index {
            self.pool.execute(
                conn,
                Action::Metrics.mask(),
                "DELETE FROM metrics WHERE index_id = ?1".into(),
                vec![int(remove.id as i64)],
            )?;
            self.pool.execute(
                conn,
                Action::Metrics.mask(),
                "DELETE FROM index_data WHERE id = ?1".into(),
                vec![int(remove.id as i64)],
            )?;
            self.caches.indexes.retain(|_, info| info.index_id != remove.id);
            self.caches.metrics.retain(|(index, _), _| *index != remove.id);
        } else {
            self.pool.execute(
                conn,
                Action::Metrics.mask(),
                "DELETE FROM metrics WHERE metric_id = ?1".into(),
                vec![int(remove.id as i64)],
            )?;
            self.caches
                .metrics
                .retain(|_, info| info.metric_id != remove.id);
        }
        Ok(())
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Bulk-flush staged rows and refresh the stats mirror
    async fn periodic_flush(&mut self) {
        self.flush_queues();
        self.pool.commit_all();
        self.sweep_outdated_instances();

        self.shared
            .sql_errors
            .store(self.pool.sql_errors(), Ordering::Relaxed);
        self.shared
            .pending_statements
            .store(self.pool.pending_statements(), Ordering::Relaxed);
        self.shared
            .staged_rows
            .store(self.queues.staged_rows(), Ordering::Relaxed);
    }

    fn flush_queues(&mut self) {
        for statement in self.queues.take_flush(&self.sizes) {
            let conn = self.pool.special(statement.conn);
            if let Err(e) = self
                .pool
                .execute(conn, statement.mask, statement.sql, Vec::new())
            {
                tracing::error!(error = %e, "staged flush failed");
            }
        }
    }

    /// Mark instances silent past the timeout as outdated
    fn sweep_outdated_instances(&mut self) {
        if self.config.instance_timeout == 0 {
            return;
        }
        let deadline = now_epoch() - self.config.instance_timeout as i64;
        if let Err(e) = self.pool.execute(
            0,
            Action::Instances.mask(),
            "UPDATE instances SET outdated = 1 WHERE running = 1 AND outdated = 0 \
             AND last_alive < ?1"
                .into(),
            vec![int(deadline)],
        ) {
            tracing::error!(error = %e, "instance timeout sweep failed");
        }
    }

    /// Reap empty groups one minute after an instance event
    pub(crate) async fn run_due_group_cleanup(&mut self) {
        match self.group_cleanup_due {
            Some(due) if tokio::time::Instant::now() >= due => {}
            _ => return,
        }
        self.group_cleanup_due = None;
        tracing::debug!("group cleanup running");

        let statements = [
            (
                SpecialConn::HostGroup,
                Action::HostGroups.mask(),
                "DELETE FROM hostgroups WHERE hostgroup_id NOT IN \
                 (SELECT DISTINCT hostgroup_id FROM hosts_hostgroups)",
            ),
            (
                SpecialConn::ServiceGroup,
                Action::ServiceGroups.mask(),
                "DELETE FROM servicegroups WHERE servicegroup_id NOT IN \
                 (SELECT DISTINCT servicegroup_id FROM services_servicegroups)",
            ),
        ];
        for (special, mask, sql) in statements {
            let conn = self.pool.special(special);
            if let Err(e) = self.pool.execute(conn, mask, sql.into(), Vec::new()) {
                tracing::error!(error = %e, "group cleanup failed");
            }
        }

        // Refresh the existence caches from the DB once the deletes land.
        let masks = mask_of(&[Action::HostGroups, Action::ServiceGroups]);
        if self.pool.finish_action(ALL_CONNECTIONS, masks).await.is_ok() {
            if let Ok(mut rows) = self.conn.query("SELECT hostgroup_id FROM hostgroups", ()).await {
                self.caches.hostgroups.clear();
                while let Ok(Some(row)) = rows.next().await {
                    if let Ok(id) = row.get::<i64>(0) {
                        self.caches.hostgroups.insert(id as u32);
                    }
                }
            }
            if let Ok(mut rows) = self
                .conn
                .query("SELECT servicegroup_id FROM servicegroups", ())
                .await
            {
                self.caches.servicegroups.clear();
                while let Ok(Some(row)) = rows.next().await {
                    if let Ok(id) = row.get::<i64>(0) {
                        self.caches.servicegroups.insert(id as u32);
                    }
                }
            }
        }
    }

    /// Connection for a host-scoped write, via the instance cache
    fn conn_for_host(&self, host_id: u32) -> usize {
        match self.caches.host_instance.get(&host_id) {
            Some(&instance_id) => self.pool.by_instance(instance_id),
            None => self.pool.best(),
        }
    }

    /// Force group cleanup on the next loop turn (tests)
    #[cfg(test)]
    pub(crate) fn trigger_group_cleanup(&mut self) {
        self.group_cleanup_due = Some(tokio::time::Instant::now());
    }

    /// Flush staged queues and wait for every statement (tests)
    pub async fn quiesce(&mut self) -> Result<()> {
        self.flush_queues();
        self.pool.finish_action(ALL_CONNECTIONS, ALL_ACTIONS).await
    }
}
