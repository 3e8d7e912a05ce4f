//! Push-based observation of stored samples and collection state.
//!
//! Every feed is backed by a `watch` channel: a new subscriber reads the
//! current value immediately, then waits for later updates.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::collector::SampleSink;
use crate::controller::CollectionState;
use crate::sample::LocationSample;
use crate::store::{SampleStore, StoreError};

/// Full history ordered by timestamp.
pub type SampleSnapshot = Arc<Vec<LocationSample>>;

pub type SampleFeed = Feed<SampleSnapshot>;
pub type LatestFeed = Feed<Option<LocationSample>>;
pub type StateFeed = Feed<CollectionState>;

/// Subscription to one feed.
pub struct Feed<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Feed<T> {
    /// Value at the time of the call.
    #[must_use]
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next update. `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stream yielding the current value first, then every update.
    #[must_use]
    pub fn into_stream(self) -> WatchStream<T> {
        WatchStream::new(self.rx)
    }
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Source of all feeds. Acts as the collection loop's [`SampleSink`].
pub struct FeedPublisher {
    samples: watch::Sender<SampleSnapshot>,
    latest: watch::Sender<Option<LocationSample>>,
    state: watch::Sender<CollectionState>,
}

impl FeedPublisher {
    #[must_use]
    pub fn new(initial_state: CollectionState) -> Self {
        Self {
            samples: watch::Sender::new(Arc::new(Vec::new())),
            latest: watch::Sender::new(None),
            state: watch::Sender::new(initial_state),
        }
    }

    #[must_use]
    pub fn observe_samples(&self) -> SampleFeed {
        Feed {
            rx: self.samples.subscribe(),
        }
    }

    #[must_use]
    pub fn observe_latest(&self) -> LatestFeed {
        Feed {
            rx: self.latest.subscribe(),
        }
    }

    #[must_use]
    pub fn observe_state(&self) -> StateFeed {
        Feed {
            rx: self.state.subscribe(),
        }
    }

    /// Publish a controller state. Unchanged states are not re-sent.
    pub fn publish_state(&self, state: CollectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Replace the sample snapshot with the store's full contents.
    ///
    /// # Errors
    ///
    /// Returns the store error if the scan fails; feeds are left untouched.
    pub async fn refresh_from_store(&self, store: &dyn SampleStore) -> Result<usize, StoreError> {
        let all = store.scan_all_ordered_by_time().await?;
        let count = all.len();
        self.latest.send_replace(all.last().copied());
        self.samples.send_replace(Arc::new(all));
        debug!(count, "sample feed refreshed from store");
        Ok(count)
    }

    fn insert(&self, sample: &LocationSample) {
        self.samples.send_modify(|snapshot| {
            let rows = Arc::make_mut(snapshot);
            // After any equal timestamps, so ties stay in insertion order.
            let at = rows.partition_point(|s| s.timestamp_ms <= sample.timestamp_ms);
            rows.insert(at, *sample);
        });
        self.latest.send_if_modified(|latest| match latest {
            Some(current) if current.timestamp_ms > sample.timestamp_ms => false,
            _ => {
                *latest = Some(*sample);
                true
            }
        });
    }
}

impl SampleSink for FeedPublisher {
    fn sample_appended(&self, sample: &LocationSample) {
        self.insert(sample);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::sample::NewSample;
    use crate::store::MemorySampleStore;
    use tokio_stream::StreamExt;

    fn sample(id: u64, ts: i64) -> LocationSample {
        NewSample {
            latitude: id as f64,
            longitude: 0.0,
            precision: 1.0,
            timestamp_ms: ts,
        }
        .with_id(id)
    }

    #[test]
    fn late_subscriber_sees_current_snapshot() {
        let feed = FeedPublisher::new(CollectionState::default());
        feed.sample_appended(&sample(1, 100));
        feed.sample_appended(&sample(2, 200));

        let late = feed.observe_samples();
        let ids: Vec<u64> = late.current().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(feed.observe_latest().current().map(|s| s.id), Some(2));
    }

    #[test]
    fn out_of_order_sample_sorts_by_timestamp() {
        let feed = FeedPublisher::new(CollectionState::default());
        feed.sample_appended(&sample(1, 300));
        feed.sample_appended(&sample(2, 100));
        feed.sample_appended(&sample(3, 300));

        let ids: Vec<u64> = feed.observe_samples().current().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        // Earlier timestamp does not displace the latest; a tie does.
        assert_eq!(feed.observe_latest().current().map(|s| s.id), Some(3));
    }

    #[tokio::test]
    async fn subscriber_is_notified_on_append() {
        let feed = FeedPublisher::new(CollectionState::default());
        let mut sub = feed.observe_samples();
        assert!(sub.current().is_empty());

        feed.sample_appended(&sample(1, 10));
        let snapshot = sub.changed().await.expect("update");
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn unchanged_state_is_not_republished() {
        let feed = FeedPublisher::new(CollectionState::default());
        let mut sub = feed.observe_state();
        feed.publish_state(CollectionState::default());

        let running = CollectionState {
            interval_millis: 10_000,
            running: true,
        };
        feed.publish_state(running);
        assert_eq!(sub.changed().await, Some(running));
    }

    #[tokio::test]
    async fn stream_replays_current_value_first() {
        let feed = FeedPublisher::new(CollectionState::default());
        let mut stream = feed.observe_state().into_stream();
        assert_eq!(stream.next().await, Some(CollectionState::default()));
    }

    #[tokio::test]
    async fn refresh_loads_persisted_history() {
        let store = MemorySampleStore::new();
        for ts in [30, 10, 20] {
            store
                .append(NewSample {
                    latitude: 0.0,
                    longitude: 0.0,
                    precision: 0.0,
                    timestamp_ms: ts,
                })
                .await
                .unwrap();
        }

        let feed = FeedPublisher::new(CollectionState::default());
        assert_eq!(feed.refresh_from_store(&store).await.unwrap(), 3);

        let stamps: Vec<i64> = feed
            .observe_samples()
            .current()
            .iter()
            .map(|s| s.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![10, 20, 30]);
        assert_eq!(feed.observe_latest().current().map(|s| s.timestamp_ms), Some(30));
    }
}
