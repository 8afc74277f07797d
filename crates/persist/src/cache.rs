//! Entity caches
//!
//! Every map here mirrors DB state so the hot paths never round-trip for a
//! key they have already seen. All caches are owned by the persister and
//! touched only from its dispatch task; coherence rules live with the
//! handlers (whoever writes the row updates the map).

use std::collections::{HashMap, HashSet};

use turso::Database;

use crate::Result;

/// Cached `index_data` row for one `(host, service)` pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexInfo {
    pub index_id: u64,
    pub rrd_retention: i32,
    pub interval: u32,
    pub special: bool,
    pub locked: bool,
}

/// Cached `metrics` row for one `(index, metric_name)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct MetricInfo {
    pub metric_id: u64,
    pub unit: String,
    pub warn: Option<f64>,
    pub crit: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub value_type: i16,
}

/// All caches, rebuilt from the DB at startup
#[derive(Debug, Default)]
pub struct Caches {
    /// Currently-enabled hosts to their poller
    pub host_instance: HashMap<u32, u32>,
    /// Host names, needed when minting index and resource rows
    pub host_names: HashMap<u32, String>,
    /// Last stored command-line hash per host
    pub host_commands: HashMap<u32, u64>,
    /// Last stored command-line hash per service
    pub service_commands: HashMap<(u32, u32), u64>,
    /// `(host, service)` to its perfdata index
    pub indexes: HashMap<(u32, u32), IndexInfo>,
    /// `(index, metric name)` to its metric row
    pub metrics: HashMap<(u64, String), MetricInfo>,
    /// `(id, parent_id)` to the resource surrogate (`parent_id` 0 = host)
    pub resources: HashMap<(u32, u32), u64>,
    /// `(id, type)` to the severity surrogate
    pub severities: HashMap<(u64, u32), u64>,
    /// `(id, type)` to the tag surrogate
    pub tags: HashMap<(u64, u32), u64>,
    /// Host groups known to exist
    pub hostgroups: HashSet<u32>,
    /// Service groups known to exist
    pub servicegroups: HashSet<u32>,
    /// Pollers disabled by configuration; their events are ignored
    pub deleted_instances: HashSet<u32>,
}

impl Caches {
    /// Rebuild every cache from the DB
    pub async fn load(db: &Database) -> Result<Self> {
        let conn = db.connect()?;
        let mut caches = Self::default();

        let mut rows = conn
            .query(
                "SELECT host_id, instance_id, name FROM hosts WHERE enabled = 1",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let host_id: i64 = row.get(0)?;
            let instance_id: i64 = row.get(1)?;
            let name: String = row.get(2)?;
            caches.host_instance.insert(host_id as u32, instance_id as u32);
            caches.host_names.insert(host_id as u32, name);
        }

        let mut rows = conn
            .query(
                "SELECT id, host_id, service_id, check_interval, rrd_retention, special, locked \
                 FROM index_data",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let index_id: i64 = row.get(0)?;
            let host_id: i64 = row.get(1)?;
            let service_id: i64 = row.get(2)?;
            let interval: Option<i64> = row.get(3)?;
            let retention: Option<i64> = row.get(4)?;
            let special: i64 = row.get(5)?;
            let locked: i64 = row.get(6)?;
            caches.indexes.insert(
                (host_id as u32, service_id as u32),
                IndexInfo {
                    index_id: index_id as u64,
                    rrd_retention: retention.unwrap_or(0) as i32,
                    interval: interval.unwrap_or(0) as u32,
                    special: special != 0,
                    locked: locked != 0,
                },
            );
        }

        let mut rows = conn
            .query(
                "SELECT metric_id, index_id, metric_name, unit_name, warn, crit, min, max, \
                 data_source_type FROM metrics",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let metric_id: i64 = row.get(0)?;
            let index_id: i64 = row.get(1)?;
            let name: String = row.get(2)?;
            let unit: Option<String> = row.get(3)?;
            let warn: Option<f64> = row.get(4)?;
            let crit: Option<f64> = row.get(5)?;
            let min: Option<f64> = row.get(6)?;
            let max: Option<f64> = row.get(7)?;
            let value_type: i64 = row.get(8)?;
            caches.metrics.insert(
                (index_id as u64, name),
                MetricInfo {
                    metric_id: metric_id as u64,
                    unit: unit.unwrap_or_default(),
                    warn,
                    crit,
                    min,
                    max,
                    value_type: value_type as i16,
                },
            );
        }

        let mut rows = conn
            .query(
                "SELECT resource_id, id, parent_id FROM resources WHERE enabled = 1",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let resource_id: i64 = row.get(0)?;
            let id: i64 = row.get(1)?;
            let parent_id: i64 = row.get(2)?;
            caches
                .resources
                .insert((id as u32, parent_id as u32), resource_id as u64);
        }

        let mut rows = conn
            .query("SELECT severity_id, id, type FROM severities", ())
            .await?;
        while let Some(row) = rows.next().await? {
            let surrogate: i64 = row.get(0)?;
            let id: i64 = row.get(1)?;
            let kind: i64 = row.get(2)?;
            caches
                .severities
                .insert((id as u64, kind as u32), surrogate as u64);
        }

        let mut rows = conn.query("SELECT tag_id, id, type FROM tags", ()).await?;
        while let Some(row) = rows.next().await? {
            let surrogate: i64 = row.get(0)?;
            let id: i64 = row.get(1)?;
            let kind: i64 = row.get(2)?;
            caches.tags.insert((id as u64, kind as u32), surrogate as u64);
        }

        let mut rows = conn.query("SELECT hostgroup_id FROM hostgroups", ()).await?;
        while let Some(row) = rows.next().await? {
            let id: i64 = row.get(0)?;
            caches.hostgroups.insert(id as u32);
        }

        let mut rows = conn
            .query("SELECT servicegroup_id FROM servicegroups", ())
            .await?;
        while let Some(row) = rows.next().await? {
            let id: i64 = row.get(0)?;
            caches.servicegroups.insert(id as u32);
        }

        let mut rows = conn
            .query("SELECT instance_id FROM instances WHERE deleted = 1", ())
            .await?;
        while let Some(row) = rows.next().await? {
            let id: i64 = row.get(0)?;
            caches.deleted_instances.insert(id as u32);
        }

        tracing::info!(
            hosts = caches.host_instance.len(),
            indexes = caches.indexes.len(),
            metrics = caches.metrics.len(),
            resources = caches.resources.len(),
            "caches loaded"
        );
        Ok(caches)
    }

    /// Forget every host belonging to `instance_id`
    pub fn forget_instance_hosts(&mut self, instance_id: u32) {
        let hosts: Vec<u32> = self
            .host_instance
            .iter()
            .filter(|(_, inst)| **inst == instance_id)
            .map(|(host, _)| *host)
            .collect();
        for host_id in hosts {
            self.host_instance.remove(&host_id);
            self.host_names.remove(&host_id);
            self.host_commands.remove(&host_id);
            self.service_commands.retain(|(h, _), _| *h != host_id);
        }
    }
}
