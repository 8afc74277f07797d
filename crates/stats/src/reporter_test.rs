use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::reporter::{ReporterBuilder, ReporterConfig};
use crate::section::StatsSection;
use crate::StatsProvider;

struct FakeEndpoint;

impl StatsProvider for FakeEndpoint {
    fn stats_section(&self) -> StatsSection {
        let mut section = StatsSection::new("endpoint central-link");
        section.push("state", "connected");
        section.push("event_speed", "412.5");

        let mut failover = StatsSection::new("failover");
        failover.push("state", "disconnected");
        failover.push("queued_events", 1000);
        section.push_child(failover);
        section
    }
}

struct FakePersister;

impl StatsProvider for FakePersister {
    fn stats_section(&self) -> StatsSection {
        let mut section = StatsSection::new("persister sql");
        section.push("processed_events", 123456);
        section
    }
}

#[test]
fn test_section_render_nests_failover_keys() {
    let mut out = String::new();
    FakeEndpoint.stats_section().render(&mut out);

    assert_eq!(
        out,
        "endpoint central-link\n\
         state=connected\n\
         event_speed=412.5\n\
         failover.state=disconnected\n\
         failover.queued_events=1000\n"
    );
}

#[test]
fn test_render_separates_components_with_blank_lines() {
    let reporter = ReporterBuilder::new()
        .provider(Arc::new(FakeEndpoint))
        .provider(Arc::new(FakePersister))
        .build();

    let document = reporter.render();
    assert!(document.starts_with("time="));
    assert!(document.contains("\n\nendpoint central-link\n"));
    assert!(document.contains("\n\npersister sql\n"));
    assert!(document.ends_with("processed_events=123456\n\n"));
}

#[test]
fn test_flush_writes_to_regular_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vigil-stats");

    let reporter = ReporterBuilder::new()
        .config(ReporterConfig {
            path: path.clone(),
            flush_interval: Duration::from_secs(10),
        })
        .provider(Arc::new(FakeEndpoint))
        .build();

    reporter.flush_once();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("state=connected"));

    // A second flush replaces the document instead of appending.
    reporter.flush_once();
    let again = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), again.lines().count());
}

#[test]
fn test_flush_into_missing_directory_is_best_effort() {
    let reporter = ReporterBuilder::new()
        .config(ReporterConfig {
            path: std::path::PathBuf::from("/nonexistent-vigil-dir/stats"),
            flush_interval: Duration::from_secs(10),
        })
        .provider(Arc::new(FakeEndpoint))
        .build();

    // Must not panic or error out.
    reporter.flush_once();
}
