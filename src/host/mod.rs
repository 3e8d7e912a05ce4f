//! Host shell integration: command/event contract, router, and stdio bridge.

pub mod channel;
pub mod contract;
pub mod events;
pub mod handler;
pub mod stdio;
