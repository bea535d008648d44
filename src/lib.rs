//! dgen-driver: drive an external parallel data generator and stream its
//! records into a processing pipeline.
//!
//! The generator itself is an independently-built native executable laid out
//! as `<install>/bin/<name>-node`. For each (stage, partition) pair the
//! driver spawns one generator process, receives its newline-delimited
//! records over a private TCP data channel, and exposes an out-of-band HTTP
//! progress channel the process reports into. The crate's core is
//! [`bridge::GeneratorBridge`], which owns that subprocess and guarantees
//! ordered teardown of every OS resource on every exit path.

pub mod bridge;
pub mod cli;
pub mod error;
pub mod logging;
pub mod params;
pub mod progress;
pub mod runner;
pub mod sequencer;

pub use bridge::GeneratorBridge;
pub use error::{BridgeError, DriverError, ParametersError};
pub use params::{TaskParameters, TaskRequest};
pub use progress::ProgressChannel;
pub use runner::{StageJob, StageSummary};
pub use sequencer::{for_stages, StagePlan};
