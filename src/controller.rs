//! Lifecycle controller: the single owner of [`CollectionState`].
//!
//! Every start/stop/reconfigure goes through one mutex-guarded transition, so
//! at most one [`CollectionLoop`] is alive and `running` never disagrees with
//! the presence of a loop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::collector::{CollectionLoop, LoopContext, LoopStatsSnapshot};
use crate::config::DEFAULT_INTERVAL_MILLIS;
use crate::error::{Result, TrackerError};
use crate::feed::FeedPublisher;
use crate::registrar::BackgroundRegistrar;

/// Current run configuration. Not persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    pub interval_millis: u64,
    pub running: bool,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self {
            interval_millis: DEFAULT_INTERVAL_MILLIS,
            running: false,
        }
    }
}

impl CollectionState {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis)
    }
}

/// Cadences offered by the interval picker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPreset {
    #[default]
    TenSeconds,
    OneMinute,
    FiveMinutes,
}

impl IntervalPreset {
    pub const ALL: [Self; 3] = [Self::TenSeconds, Self::OneMinute, Self::FiveMinutes];

    #[must_use]
    pub fn millis(self) -> u64 {
        match self {
            Self::TenSeconds => 10_000,
            Self::OneMinute => 60_000,
            Self::FiveMinutes => 300_000,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TenSeconds => "10 sec",
            Self::OneMinute => "60 sec",
            Self::FiveMinutes => "5 min",
        }
    }

    /// Preset matching an interval exactly, if any.
    #[must_use]
    pub fn from_millis(millis: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.millis() == millis)
    }
}

struct Inner {
    state: CollectionState,
    active: Option<CollectionLoop>,
    last_stats: LoopStatsSnapshot,
}

/// Mediates all access to the collection loop.
pub struct CollectionController {
    ctx: LoopContext,
    registrar: Arc<dyn BackgroundRegistrar>,
    feed: Arc<FeedPublisher>,
    inner: Mutex<Inner>,
}

impl CollectionController {
    /// Create a stopped controller with `initial_interval_millis`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidInterval`] for a zero interval.
    pub fn new(
        ctx: LoopContext,
        registrar: Arc<dyn BackgroundRegistrar>,
        feed: Arc<FeedPublisher>,
        initial_interval_millis: u64,
    ) -> Result<Self> {
        check_interval(initial_interval_millis)?;
        let state = CollectionState {
            interval_millis: initial_interval_millis,
            running: false,
        };
        feed.publish_state(state);
        Ok(Self {
            ctx,
            registrar,
            feed,
            inner: Mutex::new(Inner {
                state,
                active: None,
                last_stats: LoopStatsSnapshot::default(),
            }),
        })
    }

    /// Start collecting every `interval_millis`.
    ///
    /// When already running this only changes the interval; no second loop
    /// is created.
    pub async fn start(&self, interval_millis: u64) -> Result<CollectionState> {
        check_interval(interval_millis)?;
        let mut inner = self.inner.lock().await;

        if inner.state.running {
            return self.apply_interval(&mut inner, interval_millis).await;
        }

        if inner.active.is_some() {
            error!("live collection loop found while state says stopped");
            debug_assert!(false, "collection loop alive while stopped");
            return Err(TrackerError::ConcurrentStart);
        }

        let mut collection = CollectionLoop::new(self.ctx.clone());
        collection.start(Duration::from_millis(interval_millis))?;
        inner.active = Some(collection);
        inner.state = CollectionState {
            interval_millis,
            running: true,
        };

        if let Err(e) = self.registrar.acquire(interval_millis).await {
            warn!("background registration failed: {e}");
        }

        info!(interval_ms = interval_millis, "collection started");
        self.feed.publish_state(inner.state);
        Ok(inner.state)
    }

    /// Stop collecting. No-op when already stopped.
    ///
    /// When this returns no further sample will be appended.
    pub async fn stop(&self) -> Result<CollectionState> {
        let mut inner = self.inner.lock().await;
        if !inner.state.running {
            return Ok(inner.state);
        }

        if let Some(mut collection) = inner.active.take() {
            collection.stop().await;
            inner.last_stats = collection.stats();
        }
        inner.state.running = false;

        if let Err(e) = self.registrar.release().await {
            warn!("background release failed: {e}");
        }

        info!("collection stopped");
        self.feed.publish_state(inner.state);
        Ok(inner.state)
    }

    /// Change the interval. A running loop picks it up from its next tick.
    pub async fn reconfigure(&self, interval_millis: u64) -> Result<CollectionState> {
        check_interval(interval_millis)?;
        let mut inner = self.inner.lock().await;
        self.apply_interval(&mut inner, interval_millis).await
    }

    async fn apply_interval(&self, inner: &mut Inner, interval_millis: u64) -> Result<CollectionState> {
        if inner.state.interval_millis == interval_millis {
            return Ok(inner.state);
        }

        if inner.state.running {
            let Some(collection) = inner.active.as_ref() else {
                error!("collection marked running without a loop");
                return Err(TrackerError::ConcurrentStart);
            };
            collection.reconfigure(Duration::from_millis(interval_millis))?;
            if let Err(e) = self.registrar.acquire(interval_millis).await {
                warn!("background registration update failed: {e}");
            }
        }
        inner.state.interval_millis = interval_millis;

        info!(
            interval_ms = interval_millis,
            running = inner.state.running,
            "collection interval changed"
        );
        self.feed.publish_state(inner.state);
        Ok(inner.state)
    }

    pub async fn current_state(&self) -> CollectionState {
        self.inner.lock().await.state
    }

    /// Counters of the running loop, or of the last one if stopped.
    pub async fn stats(&self) -> LoopStatsSnapshot {
        let inner = self.inner.lock().await;
        inner
            .active
            .as_ref()
            .map_or(inner.last_stats, CollectionLoop::stats)
    }
}

fn check_interval(interval_millis: u64) -> Result<()> {
    if interval_millis == 0 {
        return Err(TrackerError::InvalidInterval(interval_millis));
    }
    Ok(())
}
