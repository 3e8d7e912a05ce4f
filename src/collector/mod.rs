//! Periodic location collection.
//!
//! [`provider`] is the acquisition seam; [`runner`] drives the timed
//! acquire → validate → stamp → append cycle on a background task.

pub mod provider;
pub mod runner;

pub use provider::{
    ChannelLocationProvider, FixOutcome, FixReporter, FixRequestHook, LocationProvider,
    fix_channel,
};
pub use runner::{
    CollectionLoop, FanoutSink, LoopContext, LoopPhase, LoopStats, LoopStatsSnapshot, NoopSink,
    SampleSink, TickOutcome,
};
