//! Schema bootstrap and column-size discovery
//!
//! The operational schema is owned by the platform installer; the broker
//! only guarantees the tables it writes exist (`CREATE TABLE IF NOT
//! EXISTS`) and reads the declared `VARCHAR(n)` widths back at startup so
//! every string it writes can be truncated, UTF-8-safely, to what the
//! column will hold.

use std::collections::HashMap;

use turso::Database;

use crate::Result;

/// Declared width of `(table, column)` pairs
#[derive(Debug, Default)]
pub struct ColumnSizes {
    sizes: HashMap<(String, String), usize>,
}

impl ColumnSizes {
    /// Declared width, if the column carries one
    pub fn get(&self, table: &str, column: &str) -> Option<usize> {
        self.sizes.get(&(table.to_string(), column.to_string())).copied()
    }

    /// Truncate `value` to the declared width of `(table, column)`
    ///
    /// Cuts on a character boundary; a column without a declared width
    /// passes the value through untouched.
    pub fn fit<'a>(&self, table: &str, column: &str, value: &'a str) -> &'a str {
        match self.get(table, column) {
            Some(limit) => truncate_utf8(value, limit),
            None => value,
        }
    }
}

/// Longest prefix of `value` at most `limit` bytes, cut on a char boundary
pub fn truncate_utf8(value: &str, limit: usize) -> &str {
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Create missing tables and report the tables touched
pub async fn bootstrap(db: &Database) -> Result<()> {
    let conn = db.connect()?;
    for ddl in ALL_TABLES {
        conn.execute(ddl, ()).await?;
    }
    for ddl in ALL_INDEXES {
        conn.execute(ddl, ()).await?;
    }
    tracing::info!(tables = ALL_TABLES.len(), "schema bootstrap complete");
    Ok(())
}

/// Read declared `VARCHAR(n)` widths for every table the persister writes
pub async fn discover_column_sizes(db: &Database) -> Result<ColumnSizes> {
    let conn = db.connect()?;
    let mut sizes = HashMap::new();
    for table in TABLE_NAMES {
        let mut rows = conn
            .query(&format!("PRAGMA table_info({table})"), ())
            .await?;
        while let Some(row) = rows.next().await? {
            let column: String = row.get(1)?;
            let decl: String = row.get(2)?;
            if let Some(limit) = parse_varchar_width(&decl) {
                sizes.insert((table.to_string(), column), limit);
            }
        }
    }
    tracing::debug!(columns = sizes.len(), "column widths discovered");
    Ok(ColumnSizes { sizes })
}

/// `VARCHAR(255)` / `varchar(64)` → 255 / 64
fn parse_varchar_width(decl: &str) -> Option<usize> {
    let lower = decl.to_ascii_lowercase();
    let rest = lower.strip_prefix("varchar(")?;
    let close = rest.find(')')?;
    rest[..close].parse().ok()
}

pub const TABLE_NAMES: &[&str] = &[
    "instances",
    "hosts",
    "services",
    "resources",
    "resources_tags",
    "hostgroups",
    "servicegroups",
    "hosts_hostgroups",
    "services_servicegroups",
    "hosts_hosts_parents",
    "hosts_hosts_dependencies",
    "services_services_dependencies",
    "comments",
    "downtimes",
    "acknowledgements",
    "customvariables",
    "logs",
    "modules",
    "index_data",
    "metrics",
    "data_bin",
    "severities",
    "tags",
];

const SCHEMA_INSTANCES: &str = r#"
CREATE TABLE IF NOT EXISTS instances (
    instance_id INTEGER PRIMARY KEY,
    name VARCHAR(255) NOT NULL DEFAULT 'localhost',
    running INTEGER NOT NULL DEFAULT 0,
    outdated INTEGER NOT NULL DEFAULT 0,
    start_time INTEGER,
    end_time INTEGER,
    last_alive INTEGER,
    pid INTEGER,
    version VARCHAR(16),
    deleted INTEGER NOT NULL DEFAULT 0
)
"#;

const SCHEMA_HOSTS: &str = r#"
CREATE TABLE IF NOT EXISTS hosts (
    host_id INTEGER PRIMARY KEY,
    instance_id INTEGER NOT NULL,
    name VARCHAR(255) NOT NULL,
    alias VARCHAR(255),
    address VARCHAR(75),
    display_name VARCHAR(255),
    enabled INTEGER NOT NULL DEFAULT 1,
    check_command TEXT,
    command_line TEXT,
    check_interval REAL,
    retry_interval REAL,
    max_check_attempts INTEGER,
    check_period VARCHAR(75),
    active_checks INTEGER,
    passive_checks INTEGER,
    check_freshness INTEGER,
    freshness_threshold REAL,
    event_handler VARCHAR(255),
    event_handler_enabled INTEGER,
    flap_detection INTEGER,
    low_flap_threshold REAL,
    high_flap_threshold REAL,
    obsess_over_host INTEGER,
    notification_interval REAL,
    notification_period VARCHAR(75),
    notify INTEGER,
    notes VARCHAR(512),
    notes_url VARCHAR(2048),
    action_url VARCHAR(2048),
    icon_image VARCHAR(255),
    checked INTEGER,
    check_type INTEGER,
    state INTEGER,
    state_type INTEGER,
    check_attempt INTEGER,
    last_check INTEGER,
    next_check INTEGER,
    last_state_change INTEGER,
    last_hard_state INTEGER,
    last_hard_state_change INTEGER,
    last_time_up INTEGER,
    last_time_down INTEGER,
    last_time_unreachable INTEGER,
    output TEXT,
    perfdata TEXT,
    flapping INTEGER,
    percent_state_change REAL,
    latency REAL,
    execution_time REAL,
    acknowledged INTEGER,
    acknowledgement_type INTEGER,
    scheduled_downtime_depth INTEGER,
    should_be_scheduled INTEGER,
    notification_number INTEGER,
    last_notification INTEGER,
    next_host_notification INTEGER,
    no_more_notifications INTEGER
)
"#;

const SCHEMA_SERVICES: &str = r#"
CREATE TABLE IF NOT EXISTS services (
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    description VARCHAR(255) NOT NULL,
    display_name VARCHAR(255),
    enabled INTEGER NOT NULL DEFAULT 1,
    check_command TEXT,
    command_line TEXT,
    check_interval REAL,
    retry_interval REAL,
    max_check_attempts INTEGER,
    check_period VARCHAR(75),
    active_checks INTEGER,
    passive_checks INTEGER,
    check_freshness INTEGER,
    freshness_threshold REAL,
    event_handler VARCHAR(255),
    event_handler_enabled INTEGER,
    flap_detection INTEGER,
    low_flap_threshold REAL,
    high_flap_threshold REAL,
    volatile INTEGER,
    obsess_over_service INTEGER,
    notification_interval REAL,
    notification_period VARCHAR(75),
    notify INTEGER,
    notes VARCHAR(512),
    notes_url VARCHAR(2048),
    action_url VARCHAR(2048),
    icon_image VARCHAR(255),
    checked INTEGER,
    check_type INTEGER,
    state INTEGER,
    state_type INTEGER,
    check_attempt INTEGER,
    last_check INTEGER,
    next_check INTEGER,
    last_state_change INTEGER,
    last_hard_state INTEGER,
    last_hard_state_change INTEGER,
    last_time_ok INTEGER,
    last_time_warning INTEGER,
    last_time_critical INTEGER,
    last_time_unknown INTEGER,
    output TEXT,
    perfdata TEXT,
    flapping INTEGER,
    percent_state_change REAL,
    latency REAL,
    execution_time REAL,
    acknowledged INTEGER,
    acknowledgement_type INTEGER,
    scheduled_downtime_depth INTEGER,
    should_be_scheduled INTEGER,
    notification_number INTEGER,
    last_notification INTEGER,
    next_notification INTEGER,
    no_more_notifications INTEGER,
    PRIMARY KEY (host_id, service_id)
)
"#;

const SCHEMA_RESOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    resource_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL DEFAULT 0,
    type INTEGER NOT NULL,
    poller_id INTEGER NOT NULL,
    name VARCHAR(255),
    parent_name VARCHAR(255),
    address VARCHAR(75),
    alias VARCHAR(255),
    status INTEGER,
    status_ordered INTEGER,
    in_downtime INTEGER NOT NULL DEFAULT 0,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    status_confirmed INTEGER,
    check_attempts INTEGER,
    max_check_attempts INTEGER,
    severity_id INTEGER,
    enabled INTEGER NOT NULL DEFAULT 1,
    notifications_enabled INTEGER,
    passive_checks_enabled INTEGER,
    active_checks_enabled INTEGER,
    last_check_type INTEGER,
    last_check INTEGER,
    last_status_change INTEGER,
    has_graph INTEGER NOT NULL DEFAULT 0,
    output TEXT,
    UNIQUE (id, parent_id)
)
"#;

const SCHEMA_RESOURCES_TAGS: &str = r#"
CREATE TABLE IF NOT EXISTS resources_tags (
    tag_id INTEGER NOT NULL,
    resource_id INTEGER NOT NULL,
    PRIMARY KEY (tag_id, resource_id)
)
"#;

const SCHEMA_HOSTGROUPS: &str = r#"
CREATE TABLE IF NOT EXISTS hostgroups (
    hostgroup_id INTEGER PRIMARY KEY,
    name VARCHAR(255) NOT NULL
)
"#;

const SCHEMA_SERVICEGROUPS: &str = r#"
CREATE TABLE IF NOT EXISTS servicegroups (
    servicegroup_id INTEGER PRIMARY KEY,
    name VARCHAR(255) NOT NULL
)
"#;

const SCHEMA_HOSTS_HOSTGROUPS: &str = r#"
CREATE TABLE IF NOT EXISTS hosts_hostgroups (
    host_id INTEGER NOT NULL,
    hostgroup_id INTEGER NOT NULL,
    PRIMARY KEY (host_id, hostgroup_id)
)
"#;

const SCHEMA_SERVICES_SERVICEGROUPS: &str = r#"
CREATE TABLE IF NOT EXISTS services_servicegroups (
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    servicegroup_id INTEGER NOT NULL,
    PRIMARY KEY (host_id, service_id, servicegroup_id)
)
"#;

const SCHEMA_HOSTS_HOSTS_PARENTS: &str = r#"
CREATE TABLE IF NOT EXISTS hosts_hosts_parents (
    child_id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL,
    PRIMARY KEY (child_id, parent_id)
)
"#;

const SCHEMA_HOSTS_HOSTS_DEPENDENCIES: &str = r#"
CREATE TABLE IF NOT EXISTS hosts_hosts_dependencies (
    host_id INTEGER NOT NULL,
    dependent_host_id INTEGER NOT NULL,
    dependency_period VARCHAR(75),
    execution_failure_options VARCHAR(15),
    notification_failure_options VARCHAR(15),
    inherits_parent INTEGER,
    PRIMARY KEY (host_id, dependent_host_id)
)
"#;

const SCHEMA_SERVICES_SERVICES_DEPENDENCIES: &str = r#"
CREATE TABLE IF NOT EXISTS services_services_dependencies (
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    dependent_host_id INTEGER NOT NULL,
    dependent_service_id INTEGER NOT NULL,
    dependency_period VARCHAR(75),
    execution_failure_options VARCHAR(15),
    notification_failure_options VARCHAR(15),
    inherits_parent INTEGER,
    PRIMARY KEY (host_id, service_id, dependent_host_id, dependent_service_id)
)
"#;

const SCHEMA_COMMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS comments (
    internal_id INTEGER NOT NULL,
    instance_id INTEGER NOT NULL,
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL DEFAULT 0,
    entry_time INTEGER NOT NULL,
    author VARCHAR(64),
    data TEXT,
    type INTEGER,
    entry_type INTEGER,
    deletion_time INTEGER NOT NULL DEFAULT 0,
    expire_time INTEGER,
    expires INTEGER,
    persistent INTEGER,
    source INTEGER,
    PRIMARY KEY (instance_id, internal_id)
)
"#;

const SCHEMA_DOWNTIMES: &str = r#"
CREATE TABLE IF NOT EXISTS downtimes (
    internal_id INTEGER NOT NULL,
    instance_id INTEGER NOT NULL,
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL DEFAULT 0,
    entry_time INTEGER,
    author VARCHAR(64),
    comment_data TEXT,
    type INTEGER,
    start_time INTEGER,
    end_time INTEGER,
    actual_start_time INTEGER NOT NULL DEFAULT 0,
    actual_end_time INTEGER NOT NULL DEFAULT 0,
    duration INTEGER,
    triggered_by INTEGER,
    fixed INTEGER,
    started INTEGER,
    cancelled INTEGER NOT NULL DEFAULT 0,
    deletion_time INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (instance_id, internal_id)
)
"#;

const SCHEMA_ACKNOWLEDGEMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS acknowledgements (
    entry_time INTEGER NOT NULL,
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL DEFAULT 0,
    instance_id INTEGER,
    author VARCHAR(64),
    comment_data TEXT,
    deletion_time INTEGER NOT NULL DEFAULT 0,
    type INTEGER,
    state INTEGER,
    sticky INTEGER,
    notify_contacts INTEGER,
    persistent_comment INTEGER,
    PRIMARY KEY (entry_time, host_id, service_id)
)
"#;

const SCHEMA_CUSTOMVARIABLES: &str = r#"
CREATE TABLE IF NOT EXISTS customvariables (
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL DEFAULT 0,
    name VARCHAR(255) NOT NULL,
    value VARCHAR(4095),
    default_value VARCHAR(4095),
    type INTEGER,
    modified INTEGER,
    update_time INTEGER,
    PRIMARY KEY (host_id, service_id, name)
)
"#;

const SCHEMA_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    ctime INTEGER,
    instance_name VARCHAR(255),
    host_id INTEGER,
    host_name VARCHAR(255),
    service_id INTEGER,
    service_description VARCHAR(255),
    output TEXT,
    status INTEGER,
    msg_type INTEGER,
    retry INTEGER,
    notification_cmd VARCHAR(255),
    notification_contact VARCHAR(255)
)
"#;

const SCHEMA_MODULES: &str = r#"
CREATE TABLE IF NOT EXISTS modules (
    module_id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_id INTEGER NOT NULL,
    filename VARCHAR(255),
    args VARCHAR(255),
    loaded INTEGER,
    should_be_loaded INTEGER
)
"#;

const SCHEMA_INDEX_DATA: &str = r#"
CREATE TABLE IF NOT EXISTS index_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    host_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL DEFAULT 0,
    host_name VARCHAR(255),
    service_description VARCHAR(255),
    check_interval INTEGER,
    rrd_retention INTEGER,
    special INTEGER NOT NULL DEFAULT 0,
    locked INTEGER NOT NULL DEFAULT 0,
    hidden INTEGER NOT NULL DEFAULT 0,
    must_be_rebuild INTEGER NOT NULL DEFAULT 0,
    UNIQUE (host_id, service_id)
)
"#;

const SCHEMA_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    metric_id INTEGER PRIMARY KEY AUTOINCREMENT,
    index_id INTEGER NOT NULL,
    metric_name VARCHAR(1021) NOT NULL,
    unit_name VARCHAR(32),
    warn REAL,
    crit REAL,
    min REAL,
    max REAL,
    current_value REAL,
    data_source_type INTEGER NOT NULL DEFAULT 0,
    UNIQUE (index_id, metric_name)
)
"#;

const SCHEMA_DATA_BIN: &str = r#"
CREATE TABLE IF NOT EXISTS data_bin (
    id_metric INTEGER NOT NULL,
    ctime INTEGER NOT NULL,
    value REAL,
    status INTEGER
)
"#;

const SCHEMA_SEVERITIES: &str = r#"
CREATE TABLE IF NOT EXISTS severities (
    severity_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id INTEGER NOT NULL,
    type INTEGER NOT NULL,
    name VARCHAR(255) NOT NULL,
    level INTEGER NOT NULL,
    icon_id INTEGER,
    UNIQUE (id, type)
)
"#;

const SCHEMA_TAGS: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id INTEGER NOT NULL,
    type INTEGER NOT NULL,
    name VARCHAR(255) NOT NULL,
    UNIQUE (id, type)
)
"#;

const ALL_TABLES: &[&str] = &[
    SCHEMA_INSTANCES,
    SCHEMA_HOSTS,
    SCHEMA_SERVICES,
    SCHEMA_RESOURCES,
    SCHEMA_RESOURCES_TAGS,
    SCHEMA_HOSTGROUPS,
    SCHEMA_SERVICEGROUPS,
    SCHEMA_HOSTS_HOSTGROUPS,
    SCHEMA_SERVICES_SERVICEGROUPS,
    SCHEMA_HOSTS_HOSTS_PARENTS,
    SCHEMA_HOSTS_HOSTS_DEPENDENCIES,
    SCHEMA_SERVICES_SERVICES_DEPENDENCIES,
    SCHEMA_COMMENTS,
    SCHEMA_DOWNTIMES,
    SCHEMA_ACKNOWLEDGEMENTS,
    SCHEMA_CUSTOMVARIABLES,
    SCHEMA_LOGS,
    SCHEMA_MODULES,
    SCHEMA_INDEX_DATA,
    SCHEMA_METRICS,
    SCHEMA_DATA_BIN,
    SCHEMA_SEVERITIES,
    SCHEMA_TAGS,
];

const ALL_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_hosts_instance ON hosts(instance_id)",
    "CREATE INDEX IF NOT EXISTS idx_services_host ON services(host_id)",
    "CREATE INDEX IF NOT EXISTS idx_resources_poller ON resources(poller_id)",
    "CREATE INDEX IF NOT EXISTS idx_data_bin_metric ON data_bin(id_metric, ctime)",
    "CREATE INDEX IF NOT EXISTS idx_logs_ctime ON logs(ctime)",
    "CREATE INDEX IF NOT EXISTS idx_modules_instance ON modules(instance_id)",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_cuts_on_char_boundary() {
        assert_eq!(truncate_utf8("short", 16), "short");
        assert_eq!(truncate_utf8("exactly", 7), "exactly");
        assert_eq!(truncate_utf8("abcdef", 3), "abc");
        // Two-byte chars: a limit inside a char backs up to its start.
        assert_eq!(truncate_utf8("ééé", 3), "é");
    }

    #[test]
    fn test_parse_varchar_width() {
        assert_eq!(parse_varchar_width("VARCHAR(255)"), Some(255));
        assert_eq!(parse_varchar_width("varchar(64)"), Some(64));
        assert_eq!(parse_varchar_width("INTEGER"), None);
        assert_eq!(parse_varchar_width("TEXT"), None);
    }

    #[tokio::test]
    async fn test_bootstrap_and_discovery() {
        let db = turso::Builder::new_local(":memory:").build().await.unwrap();
        bootstrap(&db).await.unwrap();
        // Idempotent on a second run.
        bootstrap(&db).await.unwrap();

        let sizes = discover_column_sizes(&db).await.unwrap();
        assert_eq!(sizes.get("hosts", "name"), Some(255));
        assert_eq!(sizes.get("instances", "version"), Some(16));
        assert_eq!(sizes.get("hosts", "host_id"), None);

        let long = "x".repeat(300);
        assert_eq!(sizes.fit("hosts", "name", &long).len(), 255);
        assert_eq!(sizes.fit("hosts", "output", &long).len(), 300);
    }
}
