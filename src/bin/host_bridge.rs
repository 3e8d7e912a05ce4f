//! Headless host bridge: NDJSON commands on stdin, responses and events on
//! stdout.
//!
//! All tracing output goes to stderr so stdout stays a clean protocol
//! channel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use geotrail::collector::FixRequestHook;
use geotrail::host::contract::events as event_names;
use geotrail::host::events::{EventEmitter, EventRegistrar, EventSampleSink, spawn_state_bridge};
use geotrail::host::handler::EngineHostHandler;
use geotrail::host::stdio::run_stdio_bridge;
use geotrail::logging::init_tracing;
use geotrail::{CollectorEngine, EngineHooks, TrackerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("GEOTRAIL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(TrackerConfig::default_config_path);
    let config = TrackerConfig::load_or_default(&config_path)
        .with_context(|| format!("cannot load config from {}", config_path.display()))?;

    let _log_guard = init_tracing(&config.logging).context("cannot initialise logging")?;
    tracing::info!(config = %config_path.display(), "geotrail-host starting");

    let events = EventEmitter::new(config.host.event_capacity);
    let fix_events = events.clone();
    let request_hook: FixRequestHook = Box::new(move |timeout| {
        fix_events.emit(
            event_names::LOCATION_FIX_REQUESTED,
            serde_json::json!({ "timeout_ms": timeout.as_millis() as u64 }),
        );
    });

    let hooks = EngineHooks {
        registrar: Some(Arc::new(EventRegistrar::new(events.clone()))),
        sample_sink: Some(Arc::new(EventSampleSink::new(events.clone()))),
        fix_request_hook: Some(request_hook),
    };
    let engine = Arc::new(
        CollectorEngine::open(&config, hooks)
            .await
            .context("cannot open collector engine")?,
    );
    let state_bridge = spawn_state_bridge(engine.feed().observe_state(), events.clone());

    let bridge_result = run_stdio_bridge(
        EngineHostHandler::new(Arc::clone(&engine)),
        events,
        config.host.request_capacity,
    )
    .await;

    engine.shutdown().await.context("cannot stop collection")?;
    state_bridge.abort();

    bridge_result.map_err(|e| {
        tracing::error!(error = %e, "geotrail-host exited with error");
        anyhow::anyhow!("geotrail-host failed: {e}")
    })?;

    tracing::info!("geotrail-host shut down cleanly");
    Ok(())
}
