//! Process-wide event bus
//!
//! The engine holds the set of registered muxers behind a copy-on-write
//! snapshot: registration clones the vector under a short lock, publication
//! grabs the current `Arc` and iterates it without blocking registrants.
//! No filtering happens here; each muxer applies its own filter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use vigil_protocol::Event;

use crate::error::BusError;
use crate::muxer::Muxer;
use crate::Result;

/// Counter snapshot for the stats reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub published_events: u64,
    pub rejected_events: u64,
    pub muxer_count: usize,
}

/// Fan-out hub owning non-owning registration handles to every muxer
pub struct Engine {
    muxers: RwLock<Arc<Vec<Arc<Muxer>>>>,
    stopped: AtomicBool,
    published: AtomicU64,
    rejected: AtomicU64,
}

impl Engine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self {
            muxers: RwLock::new(Arc::new(Vec::new())),
            stopped: AtomicBool::new(false),
            published: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Register a muxer; names must be unique
    pub fn register(&self, muxer: Arc<Muxer>) -> Result<()> {
        let mut guard = self.muxers.write();
        if guard.iter().any(|m| m.name() == muxer.name()) {
            return Err(BusError::DuplicateMuxer(muxer.name().to_owned()));
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        tracing::debug!(muxer = %muxer.name(), "muxer registered");
        next.push(muxer);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove a muxer by name, returning it if present
    pub fn unregister(&self, name: &str) -> Option<Arc<Muxer>> {
        let mut guard = self.muxers.write();
        let position = guard.iter().position(|m| m.name() == name)?;
        let mut next = guard.as_ref().clone();
        let removed = next.remove(position);
        *guard = Arc::new(next);
        tracing::debug!(muxer = name, "muxer unregistered");
        Some(removed)
    }

    /// Fan an event out to every registered muxer
    ///
    /// Returns [`BusError::Stopped`] once shutdown has begun; in-flight
    /// publishers learn to stop rather than silently losing events.
    pub fn publish(&self, event: &Event) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(BusError::Stopped);
        }
        let snapshot = self.muxers.read().clone();
        for muxer in snapshot.iter() {
            muxer.publish(event);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Look up a registered muxer by name
    pub fn muxer(&self, name: &str) -> Option<Arc<Muxer>> {
        self.muxers
            .read()
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    /// Snapshot of all registered muxers
    pub fn muxers(&self) -> Arc<Vec<Arc<Muxer>>> {
        self.muxers.read().clone()
    }

    /// Whether shutdown has begun
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop accepting publishes and drain every muxer to disk
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let snapshot = self.muxers.read().clone();
        tracing::info!(muxers = snapshot.len(), "bus shutting down");
        for muxer in snapshot.iter() {
            muxer.shutdown();
        }
    }

    /// Counter snapshot
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            published_events: self.published.load(Ordering::Relaxed),
            rejected_events: self.rejected.load(Ordering::Relaxed),
            muxer_count: self.muxers.read().len(),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
