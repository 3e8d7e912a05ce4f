//! Wiring: store, feed, loop context and controller from one config.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collector::{
    FanoutSink, FixRequestHook, FixReporter, LocationProvider, LoopContext, LoopStatsSnapshot,
    SampleSink, fix_channel,
};
use crate::config::TrackerConfig;
use crate::controller::{CollectionController, CollectionState};
use crate::error::Result;
use crate::feed::FeedPublisher;
use crate::registrar::{BackgroundRegistrar, NoopRegistrar};
use crate::sample::{Clock, SystemClock};
use crate::store::{SampleStore, open_store};

/// Optional host integrations attached when the engine is built.
#[derive(Default)]
pub struct EngineHooks {
    /// Background-execution registration (defaults to [`NoopRegistrar`]).
    pub registrar: Option<Arc<dyn BackgroundRegistrar>>,
    /// Extra observer of stored samples, after the feed.
    pub sample_sink: Option<Arc<dyn SampleSink>>,
    /// Called when the channel provider starts waiting for a fix.
    pub fix_request_hook: Option<FixRequestHook>,
}

/// Snapshot reported by `collection.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub running: bool,
    pub interval_ms: u64,
    pub sample_count: u64,
    pub stats: LoopStatsSnapshot,
}

/// The assembled collection engine.
pub struct CollectorEngine {
    store: Arc<dyn SampleStore>,
    feed: Arc<FeedPublisher>,
    controller: CollectionController,
    reporter: Option<FixReporter>,
}

impl CollectorEngine {
    /// Open the configured store and build an engine fed by host reports.
    ///
    /// Persisted history is loaded into the sample feed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the store cannot be
    /// opened or scanned.
    pub async fn open(config: &TrackerConfig, mut hooks: EngineHooks) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage)?;

        let (provider, reporter) = fix_channel();
        let provider = match hooks.fix_request_hook.take() {
            Some(hook) => provider.with_request_hook(hook),
            None => provider,
        };

        let mut engine =
            Self::from_parts(config, store, Arc::new(provider), Arc::new(SystemClock), hooks)
                .await?;
        engine.reporter = Some(reporter);
        info!(backend = ?config.storage.backend, "collector engine ready");
        Ok(engine)
    }

    /// Build an engine around caller-supplied collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the initial store scan
    /// fails.
    pub async fn from_parts(
        config: &TrackerConfig,
        store: Arc<dyn SampleStore>,
        provider: Arc<dyn LocationProvider>,
        clock: Arc<dyn Clock>,
        hooks: EngineHooks,
    ) -> Result<Self> {
        config.validate()?;
        let initial = CollectionState {
            interval_millis: config.collection.default_interval_ms,
            running: false,
        };
        let feed = Arc::new(FeedPublisher::new(initial));
        feed.refresh_from_store(store.as_ref()).await?;

        let sink: Arc<dyn SampleSink> = match hooks.sample_sink {
            Some(extra) => {
                let feed_sink: Arc<dyn SampleSink> = feed.clone();
                Arc::new(FanoutSink::new(vec![feed_sink, extra]))
            }
            None => feed.clone(),
        };
        let ctx = LoopContext {
            provider,
            store: Arc::clone(&store),
            sink,
            clock,
            acquisition_timeout: config.collection.acquisition_timeout(),
        };
        let registrar: Arc<dyn BackgroundRegistrar> = match hooks.registrar {
            Some(registrar) => registrar,
            None => Arc::new(NoopRegistrar),
        };
        let controller = CollectionController::new(
            ctx,
            registrar,
            Arc::clone(&feed),
            config.collection.default_interval_ms,
        )?;

        Ok(Self {
            store,
            feed,
            controller,
            reporter: None,
        })
    }

    #[must_use]
    pub fn controller(&self) -> &CollectionController {
        &self.controller
    }

    #[must_use]
    pub fn feed(&self) -> &Arc<FeedPublisher> {
        &self.feed
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SampleStore> {
        &self.store
    }

    /// Host-side fix reporter; `None` when built with a custom provider.
    #[must_use]
    pub fn reporter(&self) -> Option<&FixReporter> {
        self.reporter.as_ref()
    }

    pub async fn status(&self) -> Result<CollectionStatus> {
        let state = self.controller.current_state().await;
        let stats = self.controller.stats().await;
        let sample_count = self.store.len().await?;
        Ok(CollectionStatus {
            running: state.running,
            interval_ms: state.interval_millis,
            sample_count,
            stats,
        })
    }

    /// Stop collection if it is running.
    pub async fn shutdown(&self) -> Result<()> {
        self.controller.stop().await?;
        info!("collector engine shut down");
        Ok(())
    }
}
