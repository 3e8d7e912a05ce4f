#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use geotrail::config::StorageBackend;
use geotrail::host::channel::{HostCommandClient, command_channel};
use geotrail::host::contract::{CommandEnvelope, CommandName, EventEnvelope, events as names};
use geotrail::host::events::{EventEmitter, EventRegistrar, EventSampleSink, spawn_state_bridge};
use geotrail::host::handler::EngineHostHandler;
use geotrail::{CollectorEngine, EngineHooks, TrackerConfig};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct Host {
    client: HostCommandClient,
    engine: Arc<CollectorEngine>,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Host {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn host() -> Host {
    let mut config = TrackerConfig::default();
    config.storage.backend = StorageBackend::Memory;

    let emitter = EventEmitter::new(32);
    let hooks = EngineHooks {
        registrar: Some(Arc::new(EventRegistrar::new(emitter.clone()))),
        sample_sink: Some(Arc::new(EventSampleSink::new(emitter.clone()))),
        fix_request_hook: None,
    };
    let engine = Arc::new(CollectorEngine::open(&config, hooks).await.expect("engine"));
    let bridge = spawn_state_bridge(engine.feed().observe_state(), emitter.clone());

    let (client, server) = command_channel(8, emitter, EngineHostHandler::new(engine.clone()));
    let server = tokio::spawn(server.run());
    Host {
        client,
        engine,
        tasks: vec![bridge, server],
    }
}

async fn send(
    client: &HostCommandClient,
    command: CommandName,
    payload: serde_json::Value,
) -> serde_json::Value {
    let response = client
        .send(CommandEnvelope::new("req", command, payload))
        .await
        .unwrap_or_else(|e| panic!("{} failed: {e}", command.as_str()));
    assert!(response.ok);
    response.payload
}

async fn next_event(
    events: &mut broadcast::Receiver<EventEnvelope>,
    name: &str,
) -> EventEnvelope {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.expect("event recv");
            if event.event == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}

#[tokio::test]
async fn ping_and_version() {
    let host = host().await;
    let pong = send(&host.client, CommandName::HostPing, serde_json::json!({})).await;
    assert_eq!(pong["pong"], true);

    let version = send(&host.client, CommandName::HostVersion, serde_json::json!({})).await;
    assert_eq!(version["contract_version"], 1);
}

#[tokio::test]
async fn start_and_stop_route_to_controller_and_emit_events() {
    let host = host().await;
    let mut events = host.client.subscribe_events();

    let started = send(
        &host.client,
        CommandName::CollectionStart,
        serde_json::json!({"interval_ms": 60000}),
    )
    .await;
    assert_eq!(started["running"], true);
    assert_eq!(started["interval_ms"], 60000);
    assert!(host.engine.controller().current_state().await.running);

    let acquire = next_event(&mut events, names::BACKGROUND_ACQUIRE).await;
    assert_eq!(acquire.payload["interval_ms"], 60000);
    let changed = next_event(&mut events, names::COLLECTION_STATE_CHANGED).await;
    assert_eq!(changed.payload["running"], true);

    let stopped = send(&host.client, CommandName::CollectionStop, serde_json::json!({})).await;
    assert_eq!(stopped["running"], false);
    next_event(&mut events, names::BACKGROUND_RELEASE).await;
    let changed = next_event(&mut events, names::COLLECTION_STATE_CHANGED).await;
    assert_eq!(changed.payload["running"], false);
}

#[tokio::test]
async fn start_without_interval_uses_configured_default() {
    let host = host().await;
    let started = send(&host.client, CommandName::CollectionStart, serde_json::json!({})).await;
    assert_eq!(started["interval_ms"], 10_000);
    send(&host.client, CommandName::CollectionStop, serde_json::json!({})).await;
}

#[tokio::test]
async fn reported_location_becomes_listed_sample() {
    let host = host().await;
    let mut events = host.client.subscribe_events();

    send(
        &host.client,
        CommandName::CollectionStart,
        serde_json::json!({"interval_ms": 60000}),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(
        &host.client,
        CommandName::LocationReport,
        serde_json::json!({"latitude": 51.5, "longitude": -0.12, "precision": 8.0}),
    )
    .await;

    let appended = next_event(&mut events, names::SAMPLES_APPENDED).await;
    assert_eq!(appended.payload["latitude"], 51.5);

    let listed = send(&host.client, CommandName::SamplesList, serde_json::json!({})).await;
    let samples = listed["samples"].as_array().expect("samples array");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["longitude"], -0.12);
    assert!(samples[0]["time"].is_string());

    let latest = send(&host.client, CommandName::SamplesLatest, serde_json::json!({})).await;
    assert_eq!(latest["sample"]["id"], samples[0]["id"]);

    let status = send(&host.client, CommandName::CollectionStatus, serde_json::json!({})).await;
    assert_eq!(status["running"], true);
    assert_eq!(status["sample_count"], 1);
    assert_eq!(status["stats"]["stored"], 1);

    send(&host.client, CommandName::CollectionStop, serde_json::json!({})).await;
}

#[tokio::test]
async fn invalid_report_is_accepted_but_not_stored() {
    let host = host().await;
    send(
        &host.client,
        CommandName::CollectionStart,
        serde_json::json!({"interval_ms": 60000}),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(
        &host.client,
        CommandName::LocationReport,
        serde_json::json!({"latitude": 123.0, "longitude": 0.0, "precision": 1.0}),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = send(&host.client, CommandName::CollectionStatus, serde_json::json!({})).await;
    assert_eq!(status["running"], true);
    assert_eq!(status["sample_count"], 0);
    assert_eq!(status["stats"]["invalid"], 1);
    send(&host.client, CommandName::CollectionStop, serde_json::json!({})).await;
}

#[tokio::test]
async fn set_interval_reports_preset_label() {
    let host = host().await;
    let updated = send(
        &host.client,
        CommandName::CollectionSetInterval,
        serde_json::json!({"interval_ms": 300000}),
    )
    .await;
    assert_eq!(updated["interval_ms"], 300000);
    assert_eq!(updated["running"], false);
    assert_eq!(updated["preset"], "5 min");
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let host = host().await;
    let err = host
        .client
        .send(CommandEnvelope::new(
            "req-zero",
            CommandName::CollectionStart,
            serde_json::json!({"interval_ms": 0}),
        ))
        .await
        .expect_err("zero interval");
    assert!(err.to_string().contains("invalid collection interval"), "{err}");
    assert!(!host.engine.controller().current_state().await.running);
}

#[tokio::test]
async fn unavailable_toggle_is_reflected() {
    let host = host().await;
    let off = send(
        &host.client,
        CommandName::LocationUnavailable,
        serde_json::json!({"unavailable": true}),
    )
    .await;
    assert_eq!(off["available"], false);

    let on = send(
        &host.client,
        CommandName::LocationUnavailable,
        serde_json::json!({"unavailable": false}),
    )
    .await;
    assert_eq!(on["available"], true);
}

#[tokio::test]
async fn empty_store_has_null_latest() {
    let host = host().await;
    let latest = send(&host.client, CommandName::SamplesLatest, serde_json::json!({})).await;
    assert!(latest["sample"].is_null());
}
