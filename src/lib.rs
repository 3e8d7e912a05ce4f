//! Geotrail: background location sample collection and persistence.
//!
//! The engine owns the acquire → validate → store → publish pipeline:
//!
//! - **Collector**: a single background loop that requests fixes at a fixed
//!   cadence and appends validated samples to the store
//! - **Controller**: start/stop/reconfigure with an at-most-one-loop guard
//! - **Store**: append-only sample table (SQLite or in-memory)
//! - **Feed**: replay-latest streams of the ordered history and run state
//! - **Host**: JSON command/event surface for the embedding shell

pub mod app_dirs;
pub mod collector;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod feed;
pub mod host;
pub mod logging;
pub mod registrar;
pub mod sample;
pub mod store;

pub use config::TrackerConfig;
pub use controller::{CollectionController, CollectionState, IntervalPreset};
pub use engine::{CollectionStatus, CollectorEngine, EngineHooks};
pub use error::{Result, TrackerError};
pub use feed::{Feed, FeedPublisher};
pub use sample::{Fix, LocationSample};
pub use store::{SampleStore, StoreError};
