//! The repeating probe
//!
//! This module drives attempts against the target: connection, request,
//! body extraction, teardown and cooldown.

pub mod driver;
pub mod retry;
pub mod sink;

pub use driver::{AttemptOutcome, Probe, ProbeSettings, ProbeStats, write_all};
pub use retry::RetryPolicy;
pub use sink::{PayloadSink, TextSink};
