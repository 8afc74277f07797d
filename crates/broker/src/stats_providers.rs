//! Adapters exposing component state to the stats reporter

use std::sync::Arc;

use vigil_bus::Engine;
use vigil_endpoint::{Endpoint, EndpointStatus};
use vigil_persist::PersisterStatsHandle;
use vigil_stats::{StatsProvider, StatsSection};

/// Engine and muxer counters
pub struct BusStats {
    pub engine: Arc<Engine>,
}

impl StatsProvider for BusStats {
    fn stats_section(&self) -> StatsSection {
        let stats = self.engine.stats();
        let mut section = StatsSection::new("bus");
        section.push("published_events", stats.published_events);
        section.push("rejected_events", stats.rejected_events);
        section.push("muxers", stats.muxer_count);
        for muxer in self.engine.muxers().iter() {
            let m = muxer.stats();
            let mut child = StatsSection::new(format!("queue {}", muxer.name()));
            child.push("total_published", m.total_published);
            child.push("queued_events", m.queued_events);
            child.push("unacknowledged_events", m.unacknowledged_events);
            child.push("spilled_events", m.spilled_events);
            child.push("spool_backlog_bytes", m.spool_backlog_bytes);
            section.push_child(child);
        }
        section
    }
}

/// Per-endpoint state, failover chain included
pub struct EndpointStats {
    pub endpoint: Arc<Endpoint>,
}

fn status_section(name: String, status: &EndpointStatus) -> StatsSection {
    let mut section = StatsSection::new(name);
    let state = match &status.last_error {
        Some(error) => format!("{} (last error: {})", status.state.as_str(), error),
        None => status.state.as_str().to_string(),
    };
    section.push("state", state);
    section.push("peer", &status.peer);
    section.push("event_speed", format!("{:.1}", status.event_speed));
    section.push(
        "last_event_at",
        status.last_event_at.unwrap_or_default(),
    );
    section.push(
        "last_connect_success",
        status.last_connect_success.unwrap_or_default(),
    );
    section.push("queued_events", status.queued_events);
    section.push("unacknowledged_events", status.unacknowledged_events);
    if let Some(failover) = &status.failover {
        section.push_child(status_section("failover".into(), failover));
    }
    section
}

impl StatsProvider for EndpointStats {
    fn stats_section(&self) -> StatsSection {
        let status = self.endpoint.status();
        status_section(format!("endpoint {}", status.name), &status)
    }
}

/// SQL persister counters
pub struct PersisterStats {
    pub handle: PersisterStatsHandle,
}

impl StatsProvider for PersisterStats {
    fn stats_section(&self) -> StatsSection {
        let stats = self.handle.snapshot();
        let mut section = StatsSection::new("persister sql");
        section.push("events_processed", stats.events_processed);
        section.push("stale_status_dropped", stats.stale_status_dropped);
        section.push("ignored_events", stats.ignored_events);
        section.push("derived_events", stats.derived_events);
        section.push("sql_errors", stats.sql_errors);
        section.push("pending_statements", stats.pending_statements);
        section.push("staged_rows", stats.staged_rows);
        section.push("cached_hosts", stats.cached_hosts);
        section.push("cached_indexes", stats.cached_indexes);
        section.push("cached_metrics", stats.cached_metrics);
        section
    }
}
