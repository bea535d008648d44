//! CLI definitions and command execution for the driver frontend.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::info;

use crate::error::DriverError;
use crate::logging::LoggingConfig;
use crate::params::TaskRequest;
use crate::runner::StageJob;
use crate::sequencer::for_stages;

/// dgen-driver - run an external parallel data generator stage by stage
#[derive(Debug, Parser)]
#[command(name = "dgen-driver")]
#[command(about = "Drives an external data generator and collects its streamed records")]
pub struct Cli {
    /// Generator install directory (expects bin/<name>-node inside)
    pub dgen_install_dir: PathBuf,

    /// Scaling factor (s=1 generates 1GB)
    #[arg(short = 's', long, default_value_t = 1.0)]
    pub scaling_factor: f64,

    /// ID of the generated dataset
    #[arg(short = 'm', long, default_value = "default-dataset")]
    pub dataset_id: String,

    /// Degree of parallelism (total number of partitions)
    #[arg(short = 'N', long, default_value_t = 1)]
    pub node_count: u16,

    /// Base path for writing the output
    #[arg(short = 'o', long, default_value = "/tmp")]
    pub output_base: PathBuf,

    /// Stage to execute (repeat for multiple stages, run in order)
    #[arg(short = 'x', long = "execute-stage", required = true, action = ArgAction::Append)]
    pub execute_stage: Vec<String>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Cli {
    /// Logging configuration from the CLI flags.
    /// An explicit --log-level wins over --verbose.
    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::default();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(ref level) = self.log_level {
            config.level = level.clone();
        }
        if let Some(ref format) = self.log_format {
            config.format = format.clone();
        }
        config
    }

    fn task_request(&self) -> TaskRequest {
        TaskRequest {
            install_dir: self.dgen_install_dir.clone(),
            output_base: self.output_base.clone(),
            dataset_id: self.dataset_id.clone(),
            scaling_factor: self.scaling_factor,
            partition_count: self.node_count,
            partition_index: 0,
        }
    }
}

/// Run one stage job per requested stage, in order.
///
/// Stops at the first failing stage; earlier stages' output stays in place.
pub fn run(cli: &Cli) -> Result<(), DriverError> {
    for params in for_stages(cli.task_request(), cli.execute_stage.clone()) {
        let params = params?;
        info!(
            generator = params.generator_name(),
            stage = params.stage(),
            "running stage job"
        );
        let job = StageJob::new(params);
        job.remove_output_path()?;
        let summary = job.run()?;
        info!(
            partitions = summary.partitions,
            records = summary.records,
            "stage finished"
        );
    }
    Ok(())
}
