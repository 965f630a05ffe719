//! # Progress Relay
//!
//! Multiplexes each task's progress events to any number of remote
//! observers, holding exactly one upstream subscription per observed task.

pub mod hub;
pub mod messages;
pub mod source;

pub use hub::{Observer, ProgressRelay, RelayConfig};
pub use messages::ObserverMessage;
pub use source::{ProgressSource, Upstream, UpstreamError};
