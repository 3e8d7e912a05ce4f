//! Host event stream: collector activity rendered as [`EventEnvelope`]s.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::collector::SampleSink;
use crate::controller::CollectionState;
use crate::error::Result;
use crate::feed::StateFeed;
use crate::host::contract::{EventEnvelope, events as names};
use crate::registrar::BackgroundRegistrar;
use crate::sample::LocationSample;

/// Cloneable handle onto the host event broadcast.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventEmitter {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Broadcast one event. Dropped silently when nobody listens.
    pub fn emit(&self, event: &str, payload: serde_json::Value) {
        let envelope =
            EventEnvelope::new(uuid::Uuid::new_v4().to_string(), event.to_owned(), payload);
        if self.tx.send(envelope).is_err() {
            debug!(event, "no event subscribers");
        }
    }
}

/// JSON shape of a sample on the host surface, including its local
/// `time` label.
#[must_use]
pub fn sample_payload(sample: &LocationSample) -> serde_json::Value {
    serde_json::json!({
        "id": sample.id,
        "latitude": sample.latitude,
        "longitude": sample.longitude,
        "precision": sample.precision,
        "timestamp_ms": sample.timestamp_ms,
        "time": sample.local_time_label(),
    })
}

#[must_use]
pub fn state_payload(state: &CollectionState) -> serde_json::Value {
    serde_json::json!({
        "running": state.running,
        "interval_ms": state.interval_millis,
    })
}

/// Mirrors background registration onto the event stream so the host shell
/// can start or stop its keep-alive mechanism.
#[derive(Clone)]
pub struct EventRegistrar {
    events: EventEmitter,
}

impl EventRegistrar {
    #[must_use]
    pub fn new(events: EventEmitter) -> Self {
        Self { events }
    }
}

#[async_trait]
impl BackgroundRegistrar for EventRegistrar {
    async fn acquire(&self, interval_millis: u64) -> Result<()> {
        self.events.emit(
            names::BACKGROUND_ACQUIRE,
            serde_json::json!({ "interval_ms": interval_millis }),
        );
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.events.emit(names::BACKGROUND_RELEASE, serde_json::json!({}));
        Ok(())
    }
}

/// Emits `samples.appended` for every stored sample.
#[derive(Clone)]
pub struct EventSampleSink {
    events: EventEmitter,
}

impl EventSampleSink {
    #[must_use]
    pub fn new(events: EventEmitter) -> Self {
        Self { events }
    }
}

impl SampleSink for EventSampleSink {
    fn sample_appended(&self, sample: &LocationSample) {
        self.events.emit(names::SAMPLES_APPENDED, sample_payload(sample));
    }
}

/// Forward controller state changes as `collection.state_changed` until the
/// feed closes.
pub fn spawn_state_bridge(mut feed: StateFeed, events: EventEmitter) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(state) = feed.changed().await {
            events.emit(names::COLLECTION_STATE_CHANGED, state_payload(&state));
        }
        debug!("state feed closed; bridge exiting");
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::feed::FeedPublisher;
    use crate::sample::NewSample;
    use std::time::Duration;

    #[tokio::test]
    async fn registrar_emits_acquire_and_release() {
        let events = EventEmitter::new(8);
        let mut rx = events.subscribe();
        let registrar = EventRegistrar::new(events);

        registrar.acquire(60_000).await.unwrap();
        registrar.release().await.unwrap();

        let acquire = rx.recv().await.unwrap();
        assert_eq!(acquire.event, names::BACKGROUND_ACQUIRE);
        assert_eq!(acquire.payload["interval_ms"], 60_000);
        assert_eq!(rx.recv().await.unwrap().event, names::BACKGROUND_RELEASE);
    }

    #[test]
    fn sample_sink_emits_labelled_payload() {
        let events = EventEmitter::new(8);
        let mut rx = events.subscribe();
        let sample = NewSample {
            latitude: 1.5,
            longitude: -2.5,
            precision: 4.0,
            timestamp_ms: 1_700_000_000_000,
        }
        .with_id(7);

        EventSampleSink::new(events).sample_appended(&sample);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, names::SAMPLES_APPENDED);
        assert_eq!(event.payload["id"], 7);
        assert_eq!(event.payload["longitude"], -2.5);
        assert!(event.payload["time"].is_string());
    }

    #[tokio::test]
    async fn state_bridge_forwards_changes() {
        let events = EventEmitter::new(8);
        let mut rx = events.subscribe();
        let feed = FeedPublisher::new(CollectionState::default());
        let handle = spawn_state_bridge(feed.observe_state(), events);

        feed.publish_state(CollectionState {
            interval_millis: 300_000,
            running: true,
        });

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event timeout")
            .expect("event recv");
        assert_eq!(event.event, names::COLLECTION_STATE_CHANGED);
        assert_eq!(event.payload["running"], true);
        assert_eq!(event.payload["interval_ms"], 300_000);

        drop(feed);
        handle.await.expect("bridge exits when feed closes");
    }
}
