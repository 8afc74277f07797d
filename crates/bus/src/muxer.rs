//! Per-subscriber queue
//!
//! A muxer combines a bounded in-memory deque with a disk splitter. Below
//! the cap, events live in memory. Once the cap is hit the muxer enters
//! spill mode: every new event is framed into the splitter and reads refill
//! the deque from disk, which preserves FIFO order end to end. Spill mode
//! ends only when the disk backlog is fully drained.
//!
//! Consumption is two-phase: [`read`](Muxer::read) hands an event out but
//! keeps it accounted until [`ack`](Muxer::ack) drops it for good;
//! [`nack`](Muxer::nack) rewinds unacknowledged events for the next reader.
//! On shutdown unconsumed events are persisted to a sibling memory file and
//! reloaded ahead of the disk backlog at the next start.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::Notify;

use vigil_protocol::{encode_frame, Event, EventType, FrameDecoder, Registry};
use vigil_spool::{Splitter, SplitterOptions};

use crate::error::BusError;
use crate::{Result, DEFAULT_QUEUE_CAP};

/// Tuning knobs for a muxer
#[derive(Debug, Clone)]
pub struct MuxerOptions {
    /// Soft cap on in-memory events before spilling to disk
    pub queue_cap: usize,
    /// Splitter configuration for the overflow queue
    pub spool: SplitterOptions,
    /// Assembled-frame cap when reloading spilled events
    pub max_frame_size: usize,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            queue_cap: DEFAULT_QUEUE_CAP,
            spool: SplitterOptions::default(),
            max_frame_size: vigil_protocol::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Result of a [`Muxer::read`] call
#[derive(Debug)]
pub enum ReadOutcome {
    /// Next event in FIFO order
    Event(Event),
    /// Deadline expired with nothing to deliver
    Timeout,
    /// The muxer was shut down; no further events will arrive
    Shutdown,
}

/// Counter snapshot for the stats reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct MuxerStats {
    pub total_published: u64,
    pub filtered_out: u64,
    pub queued_events: usize,
    pub unacknowledged_events: usize,
    pub spilled_events: u64,
    pub spool_backlog_bytes: u64,
    pub corrupted_spill_events: u64,
}

struct State {
    /// Unread events, FIFO
    pending: VecDeque<Event>,
    /// Read but not yet acknowledged, FIFO (oldest first)
    unacked: VecDeque<Event>,
    /// True while the disk backlog is authoritative for ordering
    spilling: bool,
    /// Reassembly state for frames coming back off the splitter
    decoder: FrameDecoder,
    shutdown: bool,
}

/// Per-subscriber queue with filtering, spooling and ack accounting
pub struct Muxer {
    name: String,
    /// Type ids this subscriber consumes
    published_filter: HashSet<EventType>,
    /// Type ids this subscriber announces it produces (reverse routing)
    accepted_filter: HashSet<EventType>,
    registry: Arc<Registry>,
    opts: MuxerOptions,
    spool: Splitter,
    memory_path: PathBuf,
    state: Mutex<State>,
    notify: Notify,
    sequence: AtomicU64,
    total_published: AtomicU64,
    filtered_out: AtomicU64,
    spilled_events: AtomicU64,
    corrupted_spill_events: AtomicU64,
}

impl Muxer {
    /// Open the muxer named `name`, recovering any persisted backlog
    ///
    /// The spool lives at `<dir>/<name>` and the shutdown snapshot at
    /// `<dir>/<name>.memory`; both are keyed by the muxer name so state
    /// survives restarts.
    pub fn open(
        name: impl Into<String>,
        dir: &Path,
        published_filter: HashSet<EventType>,
        accepted_filter: HashSet<EventType>,
        registry: Arc<Registry>,
        opts: MuxerOptions,
    ) -> Result<Self> {
        let name = name.into();
        let spool = Splitter::open(dir.join(&name), opts.spool.clone()).map_err(|e| {
            BusError::Spool {
                muxer: name.clone(),
                source: e,
            }
        })?;

        let muxer = Self {
            memory_path: dir.join(format!("{name}.memory")),
            name,
            published_filter,
            accepted_filter,
            registry,
            spool,
            state: Mutex::new(State {
                pending: VecDeque::new(),
                unacked: VecDeque::new(),
                spilling: false,
                decoder: FrameDecoder::new(opts.max_frame_size),
                shutdown: false,
            }),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
            total_published: AtomicU64::new(0),
            filtered_out: AtomicU64::new(0),
            spilled_events: AtomicU64::new(0),
            corrupted_spill_events: AtomicU64::new(0),
            opts,
        };
        muxer.recover();
        Ok(muxer)
    }

    /// Muxer name (also the spool file prefix)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type ids this subscriber consumes
    pub fn published_filter(&self) -> &HashSet<EventType> {
        &self.published_filter
    }

    /// Type ids this subscriber announces it produces
    pub fn accepted_filter(&self) -> &HashSet<EventType> {
        &self.accepted_filter
    }

    /// Monotone sequence number of the last accepted event
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Offer an event to this subscriber
    ///
    /// O(1) amortized: either a deque push or a framed append to the spool.
    pub fn publish(&self, event: &Event) {
        if !self.published_filter.contains(&event.type_id) {
            self.filtered_out.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        self.sequence.fetch_add(1, Ordering::Relaxed);
        self.total_published.fetch_add(1, Ordering::Relaxed);

        if state.spilling || state.pending.len() >= self.opts.queue_cap {
            // Spill mode: disk is authoritative for ordering until drained.
            state.spilling = true;
            match self.spill(event) {
                Ok(()) => {
                    self.spilled_events.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::error!(
                        muxer = %self.name,
                        type_id = %event.type_id,
                        error = %e,
                        "failed to spill event, dropping"
                    );
                }
            }
        } else {
            state.pending.push_back(event.clone());
        }
        drop(state);
        self.notify.notify_one();
    }

    /// Next event, waiting up to `timeout`
    pub async fn read(&self, timeout: Duration) -> ReadOutcome {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock();
                self.refill_from_spool(&mut state);
                if let Some(event) = state.pending.pop_front() {
                    state.unacked.push_back(event.clone());
                    return ReadOutcome::Event(event);
                }
                if state.shutdown {
                    return ReadOutcome::Shutdown;
                }
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return ReadOutcome::Timeout,
            }
        }
    }

    /// Drop the `n` oldest read-but-unacknowledged events
    pub fn ack(&self, n: usize) {
        let mut state = self.state.lock();
        let take = n.min(state.unacked.len());
        state.unacked.drain(..take);
        if take < n {
            tracing::warn!(
                muxer = %self.name,
                requested = n,
                dropped = take,
                "acknowledgement exceeds outstanding events"
            );
        }
    }

    /// Return unacknowledged events to the head of the queue
    pub fn nack(&self) {
        let mut state = self.state.lock();
        while let Some(event) = state.unacked.pop_back() {
            state.pending.push_front(event);
        }
        drop(state);
        self.notify.notify_one();
    }

    /// Number of events handed out but not yet acknowledged
    pub fn unacknowledged(&self) -> usize {
        self.state.lock().unacked.len()
    }

    /// Stop the muxer and persist unconsumed events for the next start
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;

        // Unacknowledged events come before pending ones; both precede the
        // disk backlog, which is why they go to the memory file instead of
        // the spool tail.
        let mut buf = BytesMut::new();
        let mut persisted = 0usize;
        for event in state.unacked.iter().chain(state.pending.iter()) {
            match event.encode_payload(&self.registry) {
                Ok(payload) => {
                    encode_frame(
                        event.type_id,
                        event.source_id,
                        event.destination_id,
                        &payload,
                        &mut buf,
                    );
                    persisted += 1;
                }
                Err(e) => {
                    tracing::error!(muxer = %self.name, error = %e, "failed to persist event");
                }
            }
        }
        if persisted > 0 {
            if let Err(e) = std::fs::write(&self.memory_path, &buf) {
                tracing::error!(
                    muxer = %self.name,
                    path = %self.memory_path.display(),
                    error = %e,
                    "failed to write memory snapshot"
                );
            } else {
                tracing::info!(muxer = %self.name, events = persisted, "memory snapshot written");
            }
        }
        state.unacked.clear();
        state.pending.clear();
        self.spool.save_cursors();
        drop(state);
        self.notify.notify_waiters();
    }

    /// Counter snapshot
    pub fn stats(&self) -> MuxerStats {
        let state = self.state.lock();
        MuxerStats {
            total_published: self.total_published.load(Ordering::Relaxed),
            filtered_out: self.filtered_out.load(Ordering::Relaxed),
            queued_events: state.pending.len(),
            unacknowledged_events: state.unacked.len(),
            spilled_events: self.spilled_events.load(Ordering::Relaxed),
            spool_backlog_bytes: self.spool.backlog_bytes(),
            corrupted_spill_events: self.corrupted_spill_events.load(Ordering::Relaxed),
        }
    }

    fn spill(&self, event: &Event) -> Result<()> {
        let payload = event
            .encode_payload(&self.registry)
            .map_err(|e| BusError::Codec {
                muxer: self.name.clone(),
                source: e,
            })?;
        let mut buf = BytesMut::with_capacity(payload.len() + 32);
        encode_frame(
            event.type_id,
            event.source_id,
            event.destination_id,
            &payload,
            &mut buf,
        );
        self.spool.write(&buf).map_err(|e| BusError::Spool {
            muxer: self.name.clone(),
            source: e,
        })
    }

    /// Move spilled events back into memory, preserving order
    fn refill_from_spool(&self, state: &mut State) {
        if !state.spilling {
            return;
        }
        let mut chunk = [0u8; 64 * 1024];
        while state.pending.len() < self.opts.queue_cap {
            if let Some(event) = self.decode_spooled(state) {
                state.pending.push_back(event);
                continue;
            }
            match self.spool.read(&mut chunk) {
                Ok(0) => {
                    if state.decoder.pending_bytes() == 0 {
                        // Backlog fully drained: leave spill mode.
                        state.spilling = false;
                    }
                    return;
                }
                Ok(n) => state.decoder.push(&chunk[..n]),
                Err(e) => {
                    tracing::error!(muxer = %self.name, error = %e, "spool read failed");
                    return;
                }
            }
        }
    }

    fn decode_spooled(&self, state: &mut State) -> Option<Event> {
        loop {
            let frame = match state.decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!(muxer = %self.name, error = %e, "corrupted spool frame");
                    self.corrupted_spill_events.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };
            let Some(info) = self.registry.get(frame.type_id) else {
                self.corrupted_spill_events.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    muxer = %self.name,
                    type_id = %frame.type_id,
                    "unknown type in spool, skipping"
                );
                continue;
            };
            match info.decode(&frame.payload) {
                Ok(payload) => {
                    return Some(Event {
                        type_id: frame.type_id,
                        source_id: frame.source_id,
                        destination_id: frame.destination_id,
                        payload,
                    });
                }
                Err(e) => {
                    self.corrupted_spill_events.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        muxer = %self.name,
                        type_id = %frame.type_id,
                        error = %e,
                        "undecodable event in spool, skipping"
                    );
                }
            }
        }
    }

    /// Reload the shutdown snapshot and arm spill mode if a backlog exists
    fn recover(&self) {
        let mut state = self.state.lock();

        if let Ok(bytes) = std::fs::read(&self.memory_path) {
            let mut decoder = FrameDecoder::new(self.opts.max_frame_size);
            decoder.push(&bytes);
            let mut restored = 0usize;
            loop {
                match decoder.next_frame() {
                    Ok(Some(frame)) => {
                        let Some(info) = self.registry.get(frame.type_id) else {
                            continue;
                        };
                        if let Ok(payload) = info.decode(&frame.payload) {
                            state.pending.push_back(Event {
                                type_id: frame.type_id,
                                source_id: frame.source_id,
                                destination_id: frame.destination_id,
                                payload,
                            });
                            restored += 1;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            if let Err(e) = std::fs::remove_file(&self.memory_path) {
                tracing::warn!(
                    muxer = %self.name,
                    error = %e,
                    "failed to remove consumed memory snapshot"
                );
            }
            if restored > 0 {
                tracing::info!(muxer = %self.name, events = restored, "memory snapshot restored");
            }
        }

        if self.spool.backlog_bytes() > 0 {
            state.spilling = true;
        }
    }
}
