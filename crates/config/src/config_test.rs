use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::{Config, EndpointRole, TransportKind};

#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config.db.connections, 3);
    assert_eq!(config.db.queries_per_transaction, 2000);
    assert!(config.db.store_in_resources);
    assert_eq!(config.spool.max_file_size, 100_000_000);
    assert!(config.endpoints.is_empty());
}

#[test]
fn test_minimal_config() {
    let toml = r#"
[db]
path = "vigil.db"

[[endpoints]]
name = "poller-in"
role = "input"
transport = "tcp-accept"
address = "0.0.0.0:5669"
"#;
    let config = Config::from_str(toml).unwrap();
    assert_eq!(config.endpoints.len(), 1);
    let ep = &config.endpoints[0];
    assert_eq!(ep.role, EndpointRole::Input);
    assert_eq!(ep.transport, TransportKind::TcpAccept);
    assert_eq!(ep.retry_interval, Duration::from_secs(30));
    assert_eq!(ep.ack_interval, 1000);
}

#[test]
fn test_full_config_parse() {
    let toml = r#"
[broker]
name = "central"
broker_id = 7

[log]
level = "debug"

[db]
path = "/var/lib/vigil/vigil.db"
connections = 5
queries_per_transaction = 500
instance_timeout = 120
store_in_data_bin = false
rrd_len = 86400

[stats]
path = "/var/lib/vigil/vigil-stats"
flush_interval = "5s"

[spool]
directory = "/var/lib/vigil/queues"
max_file_size = 50000000

[[endpoints]]
name = "poller-in"
role = "input"
transport = "tcp-accept"
address = "0.0.0.0:5669"
categories = ["neb", "bbdo"]

[[endpoints]]
name = "rrd-out"
role = "output"
address = "127.0.0.1:5670"
retry_interval = "10s"
buffering_timeout = "2s"
categories = ["storage"]
failover = "rrd-spill"
secondaries = ["127.0.0.2:5670"]

[[endpoints]]
name = "rrd-spill"
role = "output"
address = "127.0.0.1:5671"
categories = ["storage"]
"#;
    let config = Config::from_str(toml).unwrap();
    assert_eq!(config.broker.broker_id, 7);
    assert_eq!(config.db.connections, 5);
    assert!(!config.db.store_in_data_bin);
    assert_eq!(config.stats.flush_interval, Duration::from_secs(5));

    let rrd = config.endpoint("rrd-out").unwrap();
    assert_eq!(rrd.buffering_timeout, Duration::from_secs(2));
    assert_eq!(rrd.failover.as_deref(), Some("rrd-spill"));
    assert_eq!(rrd.secondaries, vec!["127.0.0.2:5670"]);
    assert_eq!(config.failover_names(), vec!["rrd-spill"]);
}

#[test]
fn test_duplicate_endpoint_names_rejected() {
    let toml = r#"
[[endpoints]]
name = "x"
role = "input"
address = "0.0.0.0:1"

[[endpoints]]
name = "x"
role = "output"
address = "0.0.0.0:2"
"#;
    assert!(matches!(
        Config::from_str(toml),
        Err(ConfigError::DuplicateEndpoint(name)) if name == "x"
    ));
}

#[test]
fn test_unknown_failover_rejected() {
    let toml = r#"
[[endpoints]]
name = "out"
role = "output"
address = "127.0.0.1:5670"
failover = "missing"
"#;
    assert!(matches!(
        Config::from_str(toml),
        Err(ConfigError::UnknownFailover { .. })
    ));
}

#[test]
fn test_failover_cycle_rejected() {
    let toml = r#"
[[endpoints]]
name = "a"
role = "output"
address = "127.0.0.1:1"
failover = "b"

[[endpoints]]
name = "b"
role = "output"
address = "127.0.0.1:2"
failover = "a"
"#;
    assert!(matches!(
        Config::from_str(toml),
        Err(ConfigError::FailoverCycle(_))
    ));
}

#[test]
fn test_zero_connections_rejected() {
    let toml = "[db]\nconnections = 0\n";
    assert!(matches!(
        Config::from_str(toml),
        Err(ConfigError::InvalidValue { field, .. }) if field == "db.connections"
    ));
}

#[test]
fn test_unknown_category_rejected() {
    let toml = r#"
[[endpoints]]
name = "out"
role = "output"
address = "127.0.0.1:5670"
categories = ["graphs"]
"#;
    assert!(matches!(
        Config::from_str(toml),
        Err(ConfigError::InvalidValue { field, .. }) if field == "endpoints.categories"
    ));
}

#[test]
fn test_invalid_toml() {
    assert!(matches!(
        Config::from_str("invalid { toml"),
        Err(ConfigError::Parse(_))
    ));
}
