//! Endpoint worker state machine
//!
//! ```text
//! disconnected --open ok--> connected --stop--> stopped
//!      |  ^                    |
//!  open |  \--retry sleep-- waiting <--io error-- (failover activated)
//!  fail v                      ^
//!   waiting                    |
//! connected --reconnect with failover backlog--> replaying --drained--> connected
//! ```
//!
//! A worker owns its muxer exclusively; the engine only holds a
//! registration handle. The failover chain is a linear list of owned child
//! workers: while the primary is down the child's muxer takes over on the
//! bus, and after reconnect the primary drains the child before consuming
//! its own queue again. A version-major mismatch parks the worker in a
//! terminal `disconnected` until reconfigured.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vigil_bus::{Engine, Muxer, ReadOutcome};
use vigil_protocol::{Event, Payload, Registry};

use crate::error::EndpointError;
use crate::link::{BbdoLink, LinkConfig, LinkReader, LinkWriter};
use crate::transport::{BoxedTransport, FactoryKind, StreamFactory};
use crate::{Result, POLL_INTERVAL};

/// Worker states, as shown in the stats snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Listening,
    Disconnected,
    Waiting,
    Connected,
    Replaying,
    Stopped,
}

impl EndpointState {
    /// Stable name used in the stats pipe
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Disconnected => "disconnected",
            Self::Waiting => "waiting",
            Self::Connected => "connected",
            Self::Replaying => "replaying",
            Self::Stopped => "stopped",
        }
    }
}

/// Worker tuning knobs
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Sleep between reconnection attempts
    pub retry_interval: Duration,
    /// Grace period before the failover takes over the bus
    pub buffering_timeout: Duration,
    /// Link parameters (frame cap, ack cadence, idle deadline)
    pub link: LinkConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(30),
            buffering_timeout: Duration::ZERO,
            link: LinkConfig::default(),
        }
    }
}

/// Recursive status snapshot for the stats reporter
#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub name: String,
    pub state: EndpointState,
    pub peer: String,
    pub last_error: Option<String>,
    /// Exponentially smoothed events per second
    pub event_speed: f64,
    pub last_event_at: Option<i64>,
    pub last_connect_attempt: Option<i64>,
    pub last_connect_success: Option<i64>,
    pub queued_events: usize,
    pub unacknowledged_events: usize,
    pub failover: Option<Box<EndpointStatus>>,
}

struct StatusInner {
    state: EndpointState,
    terminal: bool,
    last_error: Option<String>,
    speed: f64,
    events_since_tick: u64,
    last_tick: Instant,
    last_event_at: Option<i64>,
    last_connect_attempt: Option<i64>,
    last_connect_success: Option<i64>,
}

fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One configured peer plus the worker that drives it
pub struct Endpoint {
    name: String,
    factory: Box<dyn StreamFactory>,
    secondaries: Vec<Box<dyn StreamFactory>>,
    muxer: Arc<Muxer>,
    engine: Arc<Engine>,
    registry: Arc<Registry>,
    config: EndpointConfig,
    failover: Option<Arc<Endpoint>>,
    failover_active: AtomicBool,
    failover_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    events_out: AtomicU64,
    events_in: AtomicU64,
    status: Mutex<StatusInner>,
}

impl Endpoint {
    /// Assemble a worker; `run` drives it
    pub fn new(
        name: impl Into<String>,
        factory: Box<dyn StreamFactory>,
        muxer: Arc<Muxer>,
        engine: Arc<Engine>,
        registry: Arc<Registry>,
        config: EndpointConfig,
    ) -> Self {
        Self {
            name: name.into(),
            factory,
            secondaries: Vec::new(),
            muxer,
            engine,
            registry,
            config,
            failover: None,
            failover_active: AtomicBool::new(false),
            failover_task: Mutex::new(None),
            events_out: AtomicU64::new(0),
            events_in: AtomicU64::new(0),
            status: Mutex::new(StatusInner {
                state: EndpointState::Disconnected,
                terminal: false,
                last_error: None,
                speed: 0.0,
                events_since_tick: 0,
                last_tick: Instant::now(),
                last_event_at: None,
                last_connect_attempt: None,
                last_connect_success: None,
            }),
        }
    }

    /// Add fallback peers tried, in order, after the primary fails to open
    #[must_use]
    pub fn with_secondaries(mut self, secondaries: Vec<Box<dyn StreamFactory>>) -> Self {
        self.secondaries = secondaries;
        self
    }

    /// Attach the failover worker used while this one is down
    #[must_use]
    pub fn with_failover(mut self, failover: Arc<Endpoint>) -> Self {
        self.failover = Some(failover);
        self
    }

    /// Worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The worker's exclusively-owned queue
    pub fn muxer(&self) -> &Arc<Muxer> {
        &self.muxer
    }

    /// Recursive status snapshot, failover chain included
    pub fn status(&self) -> EndpointStatus {
        let inner = self.status.lock();
        let muxer_stats = self.muxer.stats();
        EndpointStatus {
            name: self.name.clone(),
            state: inner.state,
            peer: self.factory.describe(),
            last_error: inner.last_error.clone(),
            event_speed: inner.speed,
            last_event_at: inner.last_event_at,
            last_connect_attempt: inner.last_connect_attempt,
            last_connect_success: inner.last_connect_success,
            queued_events: muxer_stats.queued_events,
            unacknowledged_events: muxer_stats.unacknowledged_events,
            failover: self
                .failover
                .as_ref()
                .map(|f| Box::new(f.status())),
        }
    }

    /// Drive the worker until cancelled or terminally failed
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            endpoint = %self.name,
            peer = %self.factory.describe(),
            "endpoint worker starting"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(match self.factory.kind() {
                FactoryKind::Accept => EndpointState::Listening,
                FactoryKind::Connect => EndpointState::Disconnected,
            });
            self.status.lock().last_connect_attempt = Some(epoch_now());

            let transport = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.open_any() => result,
            };

            match transport {
                Ok(transport) => match self.drive_connection(transport, &cancel).await {
                    Ok(()) => break,
                    Err(e) if !e.is_retryable() => {
                        tracing::error!(endpoint = %self.name, error = %e, "terminal failure");
                        {
                            let mut inner = self.status.lock();
                            inner.state = EndpointState::Disconnected;
                            inner.terminal = true;
                            inner.last_error = Some(e.to_string());
                        }
                        self.stop_failover().await;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %self.name, error = %e, "connection lost");
                        self.status.lock().last_error = Some(e.to_string());
                        self.activate_failover(&cancel).await;
                    }
                },
                Err(e) => {
                    tracing::warn!(endpoint = %self.name, error = %e, "connection failed");
                    self.status.lock().last_error = Some(e.to_string());
                    self.activate_failover(&cancel).await;
                }
            }

            self.set_state(EndpointState::Waiting);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.retry_interval) => {}
            }
        }

        self.stop_failover().await;
        self.set_state(EndpointState::Stopped);
        tracing::info!(endpoint = %self.name, "endpoint worker stopped");
    }

    /// Try the primary factory, then each secondary in order
    async fn open_any(&self) -> Result<BoxedTransport> {
        let mut last_err = match self.factory.open().await {
            Ok(t) => return Ok(t),
            Err(e) => EndpointError::Io(e),
        };
        for secondary in &self.secondaries {
            tracing::debug!(
                endpoint = %self.name,
                peer = %secondary.describe(),
                "trying secondary"
            );
            match secondary.open().await {
                Ok(t) => return Ok(t),
                Err(e) => last_err = EndpointError::Io(e),
            }
        }
        Err(last_err)
    }

    /// Negotiate, replay, then pump both directions until error or stop
    async fn drive_connection(
        &self,
        transport: BoxedTransport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut link = BbdoLink::new(transport, Arc::clone(&self.registry), self.config.link.clone());
        let peer = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = link.negotiate() => result?,
        };
        {
            let mut inner = self.status.lock();
            inner.last_connect_success = Some(epoch_now());
            inner.last_error = None;
        }
        tracing::info!(
            endpoint = %self.name,
            major = peer.major,
            minor = peer.minor,
            "peer connected"
        );

        // Everything past the confirmed cursor is re-sent.
        self.muxer.nack();

        let (mut reader, mut writer) = link.split();

        if self.failover_active.load(Ordering::Acquire) {
            self.set_state(EndpointState::Replaying);
            self.drain_failover(&mut writer, cancel).await?;
        }
        self.set_state(EndpointState::Connected);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let pending = reader.take_consumed();
                    writer.send_ack(pending).await.ok();
                    return Ok(());
                }
                outcome = self.muxer.read(POLL_INTERVAL) => match outcome {
                    ReadOutcome::Event(event) => {
                        writer.write_event(&event).await?;
                        self.events_out.fetch_add(1, Ordering::Relaxed);
                        self.note_event();
                    }
                    ReadOutcome::Timeout => {}
                    ReadOutcome::Shutdown => {
                        let pending = reader.take_consumed();
                        writer.send_ack(pending).await.ok();
                        return Ok(());
                    }
                },
                inbound = reader.read_event(POLL_INTERVAL) => match inbound? {
                    Some(event) => {
                        self.handle_inbound(event, &mut reader, &mut writer).await?;
                    }
                    None => {
                        // Quiet socket: flush a partial acknowledgement so
                        // the peer's confirmed cursor keeps moving.
                        let pending = reader.take_consumed();
                        writer.send_ack(pending).await?;
                    }
                },
            }
            self.tick_speed();
        }
    }

    async fn handle_inbound(
        &self,
        event: Event,
        reader: &mut LinkReader,
        writer: &mut LinkWriter,
    ) -> Result<()> {
        match &event.payload {
            Payload::Ack(ack) => {
                self.muxer.ack(ack.acknowledged_events as usize);
            }
            Payload::VersionResponse(_) => {
                // Repeated handshake frames are tolerated and ignored.
            }
            _ => {
                self.engine.publish(&event)?;
                self.events_in.fetch_add(1, Ordering::Relaxed);
                self.note_event();
                if reader.note_consumed() >= self.config.link.ack_interval {
                    let count = reader.take_consumed();
                    writer.send_ack(count).await?;
                }
            }
        }
        Ok(())
    }

    /// Hand the bus over to the failover worker
    async fn activate_failover(&self, cancel: &CancellationToken) {
        let Some(child) = &self.failover else {
            return;
        };
        if self.failover_active.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.config.buffering_timeout.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.buffering_timeout) => {}
            }
        }

        if let Err(e) = self.engine.register(Arc::clone(child.muxer())) {
            tracing::debug!(endpoint = %self.name, error = %e, "failover muxer already registered");
        }
        self.engine.unregister(self.muxer.name());

        let child_cancel = cancel.child_token();
        let child_fut: Pin<Box<dyn Future<Output = ()> + Send>> =
            Box::pin(Arc::clone(child).run(child_cancel.clone()));
        let handle = tokio::spawn(child_fut);
        *self.failover_task.lock() = Some((child_cancel, handle));
        tracing::info!(endpoint = %self.name, failover = %child.name(), "failover activated");
    }

    /// Replay the failover's backlog into the reconnected primary
    async fn drain_failover(
        &self,
        writer: &mut LinkWriter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(child) = &self.failover else {
            return Ok(());
        };
        self.stop_failover_task().await;
        child.muxer().nack();

        let mut replayed = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match child.muxer().read(Duration::from_millis(100)).await {
                ReadOutcome::Event(event) => {
                    writer.write_event(&event).await?;
                    child.muxer().ack(1);
                    replayed += 1;
                }
                ReadOutcome::Timeout | ReadOutcome::Shutdown => break,
            }
        }

        // Take the bus back, then sweep stragglers published while both
        // muxers were registered; duplicates are absorbed by the idempotent
        // writers downstream.
        if let Err(e) = self.engine.register(Arc::clone(&self.muxer)) {
            tracing::debug!(endpoint = %self.name, error = %e, "primary muxer already registered");
        }
        loop {
            match child.muxer().read(Duration::from_millis(100)).await {
                ReadOutcome::Event(event) => {
                    writer.write_event(&event).await?;
                    child.muxer().ack(1);
                    replayed += 1;
                }
                ReadOutcome::Timeout | ReadOutcome::Shutdown => break,
            }
        }
        self.engine.unregister(child.muxer().name());
        self.failover_active.store(false, Ordering::Release);
        tracing::info!(
            endpoint = %self.name,
            failover = %child.name(),
            events = replayed,
            "failover drained"
        );
        Ok(())
    }

    async fn stop_failover_task(&self) {
        let task = self.failover_task.lock().take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(endpoint = %self.name, error = %e, "failover task join failed");
            }
        }
    }

    async fn stop_failover(&self) {
        self.stop_failover_task().await;
        if self.failover_active.swap(false, Ordering::AcqRel)
            && let Some(child) = &self.failover
        {
            self.engine.unregister(child.muxer().name());
        }
    }

    fn set_state(&self, state: EndpointState) {
        let mut inner = self.status.lock();
        if inner.state != state {
            tracing::debug!(
                endpoint = %self.name,
                from = inner.state.as_str(),
                to = state.as_str(),
                "state transition"
            );
            inner.state = state;
        }
    }

    fn note_event(&self) {
        let mut inner = self.status.lock();
        inner.events_since_tick += 1;
        inner.last_event_at = Some(epoch_now());
    }

    /// Fold the last window into the smoothed events/s figure
    fn tick_speed(&self) {
        let mut inner = self.status.lock();
        let elapsed = inner.last_tick.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let instantaneous = inner.events_since_tick as f64 / elapsed.as_secs_f64();
        inner.speed = if inner.speed == 0.0 {
            instantaneous
        } else {
            0.8 * inner.speed + 0.2 * instantaneous
        };
        inner.events_since_tick = 0;
        inner.last_tick = Instant::now();
    }
}

