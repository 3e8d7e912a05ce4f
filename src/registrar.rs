//! Background-execution registration.
//!
//! While collection runs the hosting process must stay alive and visible as
//! doing location work (a foreground service, a background task assertion,
//! a tray indicator). The controller drives that registration through
//! [`BackgroundRegistrar`]; the mechanics stay on the host side.

use async_trait::async_trait;

use crate::error::Result;

/// Host hook mirroring the collector's running state.
#[async_trait]
pub trait BackgroundRegistrar: Send + Sync + 'static {
    /// Collection started, or its interval changed while running.
    async fn acquire(&self, interval_millis: u64) -> Result<()>;

    /// Collection stopped.
    async fn release(&self) -> Result<()>;
}

/// Registrar for hosts with no background-execution concept.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

#[async_trait]
impl BackgroundRegistrar for NoopRegistrar {
    async fn acquire(&self, _interval_millis: u64) -> Result<()> {
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        Ok(())
    }
}
