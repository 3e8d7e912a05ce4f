//! Acquisition collaborator seam.
//!
//! The collector treats fix acquisition as an opaque capability: it asks for
//! one fix with a bounded wait and gets back a fix, a timeout, or an
//! unavailable provider. Sensor warm-up, permission checks, and provider
//! selection all live on the other side of [`LocationProvider`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use crate::sample::Fix;

/// Result of a single fix request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// A fix arrived within the wait.
    Fix(Fix),
    /// No fix arrived before the deadline.
    Timeout,
    /// The provider cannot produce fixes right now (disabled, permission
    /// revoked, host gone).
    Unavailable,
}

/// Source of location fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Request one fix, waiting at most `timeout`.
    async fn request_fix(&self, timeout: Duration) -> FixOutcome;
}

/// Callback invoked when a fix request begins, carrying the wait bound.
pub type FixRequestHook = Box<dyn Fn(Duration) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Reading {
    Pending,
    Fix(Fix),
    Unavailable,
}

/// Provider fed by an external host that pushes fixes as they are measured.
///
/// Only fixes reported after a request begins satisfy it, so a reading left
/// over from an earlier attempt is never replayed.
pub struct ChannelLocationProvider {
    rx: Mutex<watch::Receiver<Reading>>,
    on_request: Option<FixRequestHook>,
}

/// Host-side handle that reports fixes and availability to a
/// [`ChannelLocationProvider`].
#[derive(Clone)]
pub struct FixReporter {
    tx: Arc<watch::Sender<Reading>>,
}

/// Create a connected provider/reporter pair.
#[must_use]
pub fn fix_channel() -> (ChannelLocationProvider, FixReporter) {
    let (tx, rx) = watch::channel(Reading::Pending);
    (
        ChannelLocationProvider {
            rx: Mutex::new(rx),
            on_request: None,
        },
        FixReporter { tx: Arc::new(tx) },
    )
}

impl ChannelLocationProvider {
    /// Invoke `hook` each time a fix request begins, e.g. to ask the host
    /// for a fresh measurement.
    #[must_use]
    pub fn with_request_hook(mut self, hook: FixRequestHook) -> Self {
        self.on_request = Some(hook);
        self
    }
}

#[async_trait]
impl LocationProvider for ChannelLocationProvider {
    async fn request_fix(&self, timeout: Duration) -> FixOutcome {
        let mut rx = self.rx.lock().await;
        if *rx.borrow_and_update() == Reading::Unavailable {
            return FixOutcome::Unavailable;
        }

        if let Some(hook) = &self.on_request {
            hook(timeout);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Err(_) => return FixOutcome::Timeout,
                Ok(Err(_)) => return FixOutcome::Unavailable,
                Ok(Ok(())) => match *rx.borrow_and_update() {
                    Reading::Fix(fix) => return FixOutcome::Fix(fix),
                    Reading::Unavailable => return FixOutcome::Unavailable,
                    // Availability restored mid-wait; keep waiting for a fix.
                    Reading::Pending => continue,
                },
            }
        }
    }
}

impl FixReporter {
    /// Report a freshly measured fix.
    pub fn report(&self, fix: Fix) {
        self.tx.send_replace(Reading::Fix(fix));
    }

    /// Mark the provider unavailable (or available again).
    pub fn set_available(&self, available: bool) {
        let next = if available {
            Reading::Pending
        } else {
            Reading::Unavailable
        };
        self.tx.send_if_modified(|current| {
            let changed = match (*current, next) {
                (Reading::Unavailable, Reading::Unavailable) => false,
                (Reading::Unavailable, _) | (_, Reading::Unavailable) => true,
                _ => false,
            };
            if changed {
                *current = next;
            }
            changed
        });
    }

    /// Whether the provider currently accepts fix requests.
    #[must_use]
    pub fn is_available(&self) -> bool {
        *self.tx.borrow() != Reading::Unavailable
    }
}
