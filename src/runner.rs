//! Local stage job runner.
//!
//! The distributed job layer is an external collaborator; this runner is its
//! single-host counterpart, and the reference consumer of the bridge API: it
//! runs one [`GeneratorBridge`] per partition on worker threads and drains
//! each partition's record lines into a `part-<NNNNN>` file under the
//! stage's job output path.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::thread;

use tracing::{debug, info, warn};

use crate::bridge::GeneratorBridge;
use crate::error::DriverError;
use crate::params::TaskParameters;

/// One per-stage generation job covering all partitions on this host.
#[derive(Debug)]
pub struct StageJob {
    params: TaskParameters,
}

/// Outcome of a completed stage job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSummary {
    pub partitions: u16,
    pub records: u64,
}

impl StageJob {
    pub fn new(params: TaskParameters) -> Self {
        Self { params }
    }

    /// Remove a pre-existing job output path so reruns start clean.
    pub fn remove_output_path(&self) -> Result<(), DriverError> {
        let path = self.params.job_output_path();
        if path.exists() {
            debug!(path = %path.display(), "removing previous job output");
            fs::remove_dir_all(&path).map_err(|source| DriverError::Output {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Run one bridge per partition and drain every record line to disk.
    ///
    /// All partitions are joined before the first error (if any) is
    /// returned, so no worker is left running behind a failed job.
    pub fn run(&self) -> Result<StageSummary, DriverError> {
        let output_dir = self.params.job_output_path();
        fs::create_dir_all(&output_dir).map_err(|source| DriverError::Output {
            path: output_dir.clone(),
            source,
        })?;

        let mut partitions = Vec::with_capacity(usize::from(self.params.partition_count()));
        for index in 0..self.params.partition_count() {
            partitions.push(self.params.for_partition(index)?);
        }

        let mut workers = Vec::with_capacity(partitions.len());
        for params in partitions {
            let part_path = output_dir.join(format!("part-{:05}", params.partition_index()));
            let worker = thread::Builder::new()
                .name(format!("dgen-partition-{}", params.partition_index()))
                .spawn(move || run_partition(params, part_path))
                .map_err(|source| DriverError::Output {
                    path: output_dir.clone(),
                    source,
                })?;
            workers.push(worker);
        }

        let mut records = 0u64;
        let mut first_error = None;
        for (index, worker) in workers.into_iter().enumerate() {
            let partition = index as u16;
            match worker.join() {
                Ok(Ok(count)) => records += count,
                Ok(Err(e)) => {
                    warn!(partition, "partition failed: {e}");
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    warn!(partition, "partition worker panicked");
                    first_error.get_or_insert(DriverError::WorkerPanicked { partition });
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            stage = self.params.stage(),
            partitions = self.params.partition_count(),
            records,
            "stage job complete"
        );
        Ok(StageSummary {
            partitions: self.params.partition_count(),
            records,
        })
    }
}

/// Drain one partition's bridge into its part file.
fn run_partition(params: TaskParameters, part_path: PathBuf) -> Result<u64, DriverError> {
    let partition = params.partition_index();
    let mut bridge = GeneratorBridge::open(&params)?;

    let file = File::create(&part_path).map_err(|source| DriverError::Output {
        path: part_path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let mut records = 0u64;
    loop {
        let line = bridge
            .next_line()
            .map_err(|source| DriverError::Stream { partition, source })?;
        let Some(line) = line else {
            break;
        };
        writeln!(writer, "{line}").map_err(|source| DriverError::Output {
            path: part_path.clone(),
            source,
        })?;
        records += 1;
    }
    writer.flush().map_err(|source| DriverError::Output {
        path: part_path.clone(),
        source,
    })?;

    let progress = bridge.progress();
    bridge.close();
    info!(partition, records, ?progress, "partition drained");
    Ok(records)
}
