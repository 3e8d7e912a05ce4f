//! Host command channel and router.
//!
//! Commands arrive as [`CommandEnvelope`]s on an mpsc queue and are routed to
//! a [`HostCommandHandler`]; each request gets its [`ResponseEnvelope`] back
//! over a oneshot. Events share one broadcast stream.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{Result, TrackerError};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use crate::host::events::EventEmitter;
use crate::sample::Fix;

/// Backend operations reachable from the host surface.
///
/// Each method returns the JSON payload of a successful response.
#[async_trait]
pub trait HostCommandHandler: Send + Sync + 'static {
    /// Start collecting. `None` keeps the current interval.
    async fn start_collection(&self, interval_ms: Option<u64>) -> Result<Value>;
    async fn stop_collection(&self) -> Result<Value>;
    async fn collection_status(&self) -> Result<Value>;
    async fn set_interval(&self, interval_ms: u64) -> Result<Value>;
    async fn list_samples(&self) -> Result<Value>;
    async fn latest_sample(&self) -> Result<Value>;
    async fn report_location(&self, fix: Fix) -> Result<Value>;
    async fn set_location_unavailable(&self, unavailable: bool) -> Result<Value>;
}

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<Result<ResponseEnvelope>>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    events: EventEmitter,
}

impl HostCommandClient {
    /// Send one command and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope is invalid, the server is gone, or
    /// the handler rejected the command.
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            TrackerError::Host(format!(
                "invalid host command envelope {}: {}",
                envelope.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| TrackerError::Channel(format!("failed to send host command: {e}")))?;

        response_rx
            .await
            .map_err(|e| TrackerError::Channel(format!("host command response dropped: {e}")))?
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }
}

pub struct HostCommandServer<H: HostCommandHandler> {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    handler: H,
}

/// Create a client/server pair over `events`.
///
/// Events emitted elsewhere through the same emitter (collector activity,
/// background registration) reach every client subscriber.
#[must_use]
pub fn command_channel<H: HostCommandHandler>(
    request_capacity: usize,
    events: EventEmitter,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (
        HostCommandClient { request_tx, events },
        HostCommandServer {
            request_rx,
            handler,
        },
    )
}

impl<H: HostCommandHandler> HostCommandServer<H> {
    /// Serve requests until every client is dropped.
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let response = self.route(&request.envelope).await;
            let _ = request.response_tx.send(response);
        }
        tracing::debug!("host command server exiting");
    }

    /// Route a command envelope to the handler.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let payload = &envelope.payload;
        let body = match envelope.command {
            CommandName::HostPing => serde_json::json!({"pong": true}),
            CommandName::HostVersion => serde_json::json!({
                "contract_version": crate::host::contract::EVENT_VERSION,
                "package_version": env!("CARGO_PKG_VERSION"),
            }),
            CommandName::CollectionStart => {
                let interval_ms = optional_u64(payload, "interval_ms", envelope.command)?;
                self.handler.start_collection(interval_ms).await?
            }
            CommandName::CollectionStop => self.handler.stop_collection().await?,
            CommandName::CollectionStatus => self.handler.collection_status().await?,
            CommandName::CollectionSetInterval => {
                let interval_ms = required_u64(payload, "interval_ms", envelope.command)?;
                self.handler.set_interval(interval_ms).await?
            }
            CommandName::SamplesList => self.handler.list_samples().await?,
            CommandName::SamplesLatest => self.handler.latest_sample().await?,
            CommandName::LocationReport => {
                let fix = parse_fix(payload)?;
                self.handler.report_location(fix).await?
            }
            CommandName::LocationUnavailable => {
                let unavailable = payload
                    .get("unavailable")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| missing(envelope.command, "unavailable (bool)"))?;
                self.handler.set_location_unavailable(unavailable).await?
            }
        };
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), body))
    }
}

fn missing(command: CommandName, field: &str) -> TrackerError {
    TrackerError::Host(format!("{} requires payload.{field}", command.as_str()))
}

fn optional_u64(payload: &Value, field: &str, command: CommandName) -> Result<Option<u64>> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => raw
            .as_u64()
            .map(Some)
            .ok_or_else(|| missing(command, &format!("{field} (non-negative integer)"))),
    }
}

fn required_u64(payload: &Value, field: &str, command: CommandName) -> Result<u64> {
    optional_u64(payload, field, command)?.ok_or_else(|| missing(command, field))
}

fn parse_fix(payload: &Value) -> Result<Fix> {
    let number = |field: &str| {
        payload
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(CommandName::LocationReport, &format!("{field} (number)")))
    };
    Ok(Fix::new(
        number("latitude")?,
        number("longitude")?,
        number("precision")?,
    ))
}
