//! Collection loop: one background task that acquires, validates, stamps,
//! and stores a fix per tick.
//!
//! Ticks are spaced start-to-start. When an attempt overruns its interval
//! the next one begins as soon as it completes. Interval changes apply to
//! the next scheduled tick and never restart an in-flight attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::provider::{FixOutcome, LocationProvider};
use crate::error::{Result, TrackerError};
use crate::sample::{Clock, LocationSample, SampleId};
use crate::store::SampleStore;

/// Receives every sample the loop stores, in append order.
pub trait SampleSink: Send + Sync + 'static {
    fn sample_appended(&self, sample: &LocationSample);
}

/// Sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl SampleSink for NoopSink {
    fn sample_appended(&self, _sample: &LocationSample) {}
}

/// Forwards each sample to several sinks, in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn SampleSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn SampleSink>>) -> Self {
        Self { sinks }
    }
}

impl SampleSink for FanoutSink {
    fn sample_appended(&self, sample: &LocationSample) {
        for sink in &self.sinks {
            sink.sample_appended(sample);
        }
    }
}

/// Collaborators shared by every loop instance a controller spawns.
#[derive(Clone)]
pub struct LoopContext {
    pub provider: Arc<dyn LocationProvider>,
    pub store: Arc<dyn SampleStore>,
    pub sink: Arc<dyn SampleSink>,
    pub clock: Arc<dyn Clock>,
    /// Upper bound on one fix request; clamped to the active interval.
    pub acquisition_timeout: Duration,
}

/// Lifecycle phase of a [`CollectionLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Idle,
    Running,
    Stopping,
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Stored(SampleId),
    Invalid,
    TimedOut,
    Unavailable,
    StorageFault,
}

/// Per-loop tick counters.
#[derive(Debug, Default)]
pub struct LoopStats {
    ticks: AtomicU64,
    stored: AtomicU64,
    invalid: AtomicU64,
    timed_out: AtomicU64,
    unavailable: AtomicU64,
    storage_faults: AtomicU64,
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStatsSnapshot {
    pub ticks: u64,
    pub stored: u64,
    pub invalid: u64,
    pub timed_out: u64,
    pub unavailable: u64,
    pub storage_faults: u64,
}

impl LoopStats {
    fn record(&self, outcome: TickOutcome) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TickOutcome::Stored(_) => &self.stored,
            TickOutcome::Invalid => &self.invalid,
            TickOutcome::TimedOut => &self.timed_out,
            TickOutcome::Unavailable => &self.unavailable,
            TickOutcome::StorageFault => &self.storage_faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            storage_faults: self.storage_faults.load(Ordering::Relaxed),
        }
    }
}

struct Active {
    cancel: CancellationToken,
    interval_tx: watch::Sender<Duration>,
    handle: JoinHandle<()>,
}

/// A single acquisition cycle. Idle → Running → Stopping → Idle.
///
/// The loop does not guard against sibling instances; the controller owns
/// the at-most-one invariant.
pub struct CollectionLoop {
    ctx: LoopContext,
    phase: LoopPhase,
    stats: Arc<LoopStats>,
    active: Option<Active>,
}

impl CollectionLoop {
    #[must_use]
    pub fn new(ctx: LoopContext) -> Self {
        Self {
            ctx,
            phase: LoopPhase::Idle,
            stats: Arc::new(LoopStats::default()),
            active: None,
        }
    }

    /// Spawn the background task. The first tick starts immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidInterval`] for a zero interval and
    /// [`TrackerError::ConcurrentStart`] if this loop is not idle.
    pub fn start(&mut self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(TrackerError::InvalidInterval(0));
        }
        if self.phase != LoopPhase::Idle {
            return Err(TrackerError::ConcurrentStart);
        }

        let cancel = CancellationToken::new();
        let (interval_tx, interval_rx) = watch::channel(interval);
        let worker = Worker {
            ctx: self.ctx.clone(),
            cancel: cancel.clone(),
            interval_rx,
            stats: Arc::clone(&self.stats),
        };
        let handle = tokio::spawn(worker.run());

        self.active = Some(Active {
            cancel,
            interval_tx,
            handle,
        });
        self.phase = LoopPhase::Running;
        info!(interval_ms = interval.as_millis() as u64, "collection loop started");
        Ok(())
    }

    /// Change the cadence. Takes effect from the next scheduled tick.
    pub fn reconfigure(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(TrackerError::InvalidInterval(0));
        }
        if let Some(active) = &self.active {
            active.interval_tx.send_replace(interval);
            debug!(interval_ms = interval.as_millis() as u64, "collection loop reconfigured");
        }
        Ok(())
    }

    /// Cancel any pending wait and join the worker.
    ///
    /// Once this returns no further append will be issued by this loop. A
    /// fix that arrives after cancellation is discarded.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.phase = LoopPhase::Stopping;
        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            if e.is_panic() {
                error!("collection loop worker panicked: {e}");
            }
        }
        self.phase = LoopPhase::Idle;
        info!("collection loop stopped");
    }

    #[must_use]
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Current interval, `None` when idle.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| *a.interval_tx.borrow())
    }

    #[must_use]
    pub fn stats(&self) -> LoopStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for CollectionLoop {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

struct Worker {
    ctx: LoopContext,
    cancel: CancellationToken,
    interval_rx: watch::Receiver<Duration>,
    stats: Arc<LoopStats>,
}

impl Worker {
    async fn run(mut self) {
        let mut next_start = Instant::now();
        let mut last_start: Option<Instant> = None;

        loop {
            // Wait for the slot; re-plan if the interval changes meanwhile.
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep_until(next_start) => break,
                    changed = self.interval_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let interval = *self.interval_rx.borrow_and_update();
                        if let Some(started) = last_start {
                            next_start = started + interval;
                        }
                    }
                }
            }

            let started = Instant::now();
            last_start = Some(started);
            let interval = *self.interval_rx.borrow();

            let Some(outcome) = self.attempt(interval).await else {
                return;
            };
            self.stats.record(outcome);

            // In-flight tick finished on the old timing; pick up any change now.
            let interval = *self.interval_rx.borrow_and_update();
            next_start = started + interval;
        }
    }

    /// One acquire → validate → stamp → append cycle.
    ///
    /// Returns `None` when cancelled before anything was stored.
    async fn attempt(&self, interval: Duration) -> Option<TickOutcome> {
        let timeout = self.ctx.acquisition_timeout.min(interval);

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            result = tokio::time::timeout(timeout, self.ctx.provider.request_fix(timeout)) => {
                result.unwrap_or(FixOutcome::Timeout)
            }
        };

        let fix = match outcome {
            FixOutcome::Fix(fix) => fix,
            FixOutcome::Timeout => {
                debug!(timeout_ms = timeout.as_millis() as u64, "fix request timed out; tick skipped");
                return Some(TickOutcome::TimedOut);
            }
            FixOutcome::Unavailable => {
                warn!("location provider unavailable; tick skipped");
                return Some(TickOutcome::Unavailable);
            }
        };

        if self.cancel.is_cancelled() {
            debug!("fix arrived after stop; discarded");
            return None;
        }

        let sample = match fix.accept(self.ctx.clock.now_millis()) {
            Ok(sample) => sample,
            Err(rejection) => {
                warn!(
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    precision = fix.precision,
                    "invalid fix discarded: {rejection}"
                );
                return Some(TickOutcome::Invalid);
            }
        };

        match self.ctx.store.append(sample).await {
            Ok(id) => {
                let stored = sample.with_id(id);
                debug!(id, timestamp_ms = stored.timestamp_ms, "sample stored");
                self.ctx.sink.sample_appended(&stored);
                Some(TickOutcome::Stored(id))
            }
            Err(e) => {
                error!("cannot store sample; it is dropped: {e}");
                Some(TickOutcome::StorageFault)
            }
        }
    }
}
