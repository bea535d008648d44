//! Error types for the data generator driver.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors raised while resolving task parameters.
///
/// These fail fast, before any OS resource is opened.
#[derive(Debug, Error)]
pub enum ParametersError {
    #[error("generator install dir `{0}` does not exist or is not a directory")]
    InstallDirNotFound(PathBuf),

    #[error("generator node executable `{0}` does not exist or is not a regular file")]
    ExecutableNotFound(PathBuf),

    #[error("base output path `{0}` should be absolute")]
    RelativeOutputPath(PathBuf),

    #[error("scaling factor {0} should be positive")]
    NonPositiveScalingFactor(f64),

    #[error("partition index {index} is out of range for partition count {count}")]
    PartitionIndexOutOfRange { index: u16, count: u16 },

    #[error("failed to read properties file `{path}`: {source}")]
    PropertiesUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resource-acquisition errors raised while opening a generator bridge.
///
/// Each variant corresponds to one step of `GeneratorBridge::open`; a failed
/// step tears down everything opened before it, so none of these leaves a
/// partially opened bridge behind.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind data channel listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to start progress channel: {0}")]
    Progress(#[source] std::io::Error),

    #[error("failed to launch generator process `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept generator data connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to open generator record stream: {0}")]
    StreamOpen(#[source] std::io::Error),
}

/// Job-level errors surfaced by the local stage runner and the CLI.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid task parameters: {0}")]
    Parameters(#[from] ParametersError),

    #[error("failed to open generator bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error("record stream failed for partition {partition}: {source}")]
    Stream {
        partition: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write job output `{path}`: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("partition worker {partition} panicked")]
    WorkerPanicked { partition: u16 },
}
