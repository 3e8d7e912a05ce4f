//! Production host command handler backed by a [`CollectorEngine`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::controller::IntervalPreset;
use crate::engine::CollectorEngine;
use crate::error::{Result, TrackerError};
use crate::host::channel::HostCommandHandler;
use crate::host::events::{sample_payload, state_payload};
use crate::sample::Fix;

pub struct EngineHostHandler {
    engine: Arc<CollectorEngine>,
}

impl std::fmt::Debug for EngineHostHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHostHandler").finish_non_exhaustive()
    }
}

impl EngineHostHandler {
    #[must_use]
    pub fn new(engine: Arc<CollectorEngine>) -> Self {
        Self { engine }
    }

    fn reporter(&self) -> Result<&crate::collector::FixReporter> {
        self.engine.reporter().ok_or_else(|| {
            TrackerError::Host("engine has no host-fed location provider".to_owned())
        })
    }
}

#[async_trait]
impl HostCommandHandler for EngineHostHandler {
    async fn start_collection(&self, interval_ms: Option<u64>) -> Result<Value> {
        let controller = self.engine.controller();
        let interval_ms = match interval_ms {
            Some(ms) => ms,
            None => controller.current_state().await.interval_millis,
        };
        info!(interval_ms, "collection.start requested");
        let state = controller.start(interval_ms).await?;
        Ok(state_payload(&state))
    }

    async fn stop_collection(&self) -> Result<Value> {
        info!("collection.stop requested");
        let state = self.engine.controller().stop().await?;
        Ok(state_payload(&state))
    }

    async fn collection_status(&self) -> Result<Value> {
        let status = self.engine.status().await?;
        serde_json::to_value(status)
            .map_err(|e| TrackerError::Host(format!("cannot encode status: {e}")))
    }

    async fn set_interval(&self, interval_ms: u64) -> Result<Value> {
        let state = self.engine.controller().reconfigure(interval_ms).await?;
        let mut payload = state_payload(&state);
        payload["preset"] = IntervalPreset::from_millis(interval_ms)
            .map_or(Value::Null, |p| Value::from(p.label()));
        Ok(payload)
    }

    async fn list_samples(&self) -> Result<Value> {
        let samples = self.engine.store().scan_all_ordered_by_time().await?;
        let rows: Vec<Value> = samples.iter().map(sample_payload).collect();
        Ok(serde_json::json!({ "samples": rows }))
    }

    async fn latest_sample(&self) -> Result<Value> {
        let latest = self.engine.store().latest().await?;
        Ok(serde_json::json!({ "sample": latest.as_ref().map(sample_payload) }))
    }

    async fn report_location(&self, fix: Fix) -> Result<Value> {
        self.reporter()?.report(fix);
        Ok(serde_json::json!({ "accepted": true }))
    }

    async fn set_location_unavailable(&self, unavailable: bool) -> Result<Value> {
        let reporter = self.reporter()?;
        reporter.set_available(!unavailable);
        info!(unavailable, "location availability changed");
        Ok(serde_json::json!({ "available": reporter.is_available() }))
    }
}
