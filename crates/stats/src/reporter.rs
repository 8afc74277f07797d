//! Snapshot reporter task
//!
//! Collects every registered provider at the configured interval and dumps
//! the result to the stats path. Writes are strictly best-effort: a FIFO
//! without a reader, a permission problem or a full disk cost one debug log
//! line, never a stall. The file handle is opened and closed around every
//! snapshot so a `tail -f` consumer sees complete documents.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{SharedProvider, StatsSection};

/// Reporter settings
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Snapshot destination (regular file or pre-created FIFO)
    pub path: PathBuf,
    /// Cadence between snapshots
    pub flush_interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/vigil/vigil-stats"),
            flush_interval: Duration::from_secs(10),
        }
    }
}

/// Builder collecting providers before the reporter starts
#[derive(Default)]
pub struct ReporterBuilder {
    config: Option<ReporterConfig>,
    providers: Vec<SharedProvider>,
}

impl ReporterBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reporter configuration
    pub fn config(mut self, config: ReporterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a provider
    pub fn provider(mut self, provider: SharedProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Register several providers
    pub fn providers(mut self, providers: Vec<SharedProvider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Build the reporter
    pub fn build(self) -> Reporter {
        Reporter {
            config: self.config.unwrap_or_default(),
            providers: self.providers,
        }
    }
}

/// Periodic snapshot writer
pub struct Reporter {
    config: ReporterConfig,
    providers: Vec<SharedProvider>,
}

impl Reporter {
    /// Render one snapshot document
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(1024);
        out.push_str(&format!(
            "time={}\n\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        ));
        for provider in &self.providers {
            let section: StatsSection = provider.stats_section();
            section.render(&mut out);
            out.push('\n');
        }
        out
    }

    /// Write one snapshot, best-effort
    pub fn flush_once(&self) {
        let document = self.render();
        if let Err(e) = self.write_snapshot(document.as_bytes()) {
            tracing::debug!(
                path = %self.config.path.display(),
                error = %e,
                "stats snapshot skipped"
            );
        }
    }

    #[cfg(unix)]
    fn write_snapshot(&self, bytes: &[u8]) -> std::io::Result<()> {
        use std::os::unix::fs::OpenOptionsExt;
        // O_NONBLOCK makes opening a reader-less FIFO fail with ENXIO
        // instead of blocking the reporter task.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.config.path)?;
        file.write_all(bytes)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn write_snapshot(&self, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::write(&self.config.path, bytes)
    }

    /// Run until cancelled, flushing once per interval and once at exit
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            path = %self.config.path.display(),
            interval_secs = self.config.flush_interval.as_secs(),
            providers = self.providers.len(),
            "stats reporter starting"
        );
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.flush_once(),
            }
        }
        self.flush_once();
        tracing::info!("stats reporter stopped");
    }
}
