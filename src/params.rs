//! Validated task parameters for one (stage, partition) generation task.
//!
//! A [`TaskRequest`] is the caller's unvalidated description of a generation
//! run. [`TaskParameters::resolve`] turns it into an immutable, validated
//! parameter set for a single stage, failing fast when the install layout is
//! broken so no OS resource is ever opened for a doomed task.

pub mod properties;

use std::path::{Path, PathBuf};

use crate::error::ParametersError;

/// Unvalidated description of a generation run, shared by all stages.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Generator install directory (`<dir>/bin/<name>-node` must exist).
    pub install_dir: PathBuf,
    /// Absolute base path under which job output is written.
    pub output_base: PathBuf,
    /// Identifier of the generated dataset.
    pub dataset_id: String,
    /// Scaling factor (1.0 generates roughly 1 GB, dataset-specific).
    pub scaling_factor: f64,
    /// Total number of partitions.
    pub partition_count: u16,
    /// This partition's index, in `[0, partition_count)`.
    pub partition_index: u16,
}

/// Immutable, validated parameters for one (stage, partition) task.
#[derive(Debug, Clone)]
pub struct TaskParameters {
    install_dir: PathBuf,
    executable: PathBuf,
    generator_name: String,
    output_base: PathBuf,
    dataset_id: String,
    stage: String,
    output_file: String,
    scaling_factor: f64,
    partition_count: u16,
    partition_index: u16,
}

impl TaskParameters {
    /// Validate `request` for `stage` and resolve derived paths.
    ///
    /// Validation order: install dir is a directory, the derived node
    /// executable is a regular file, the output base is absolute, then the
    /// numeric invariants. The first violation wins.
    pub fn resolve(request: &TaskRequest, stage: &str) -> Result<Self, ParametersError> {
        if !request.install_dir.is_dir() {
            return Err(ParametersError::InstallDirNotFound(
                request.install_dir.clone(),
            ));
        }
        let install_dir = request
            .install_dir
            .canonicalize()
            .map_err(|_| ParametersError::InstallDirNotFound(request.install_dir.clone()))?;
        let generator_name = install_dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ParametersError::InstallDirNotFound(install_dir.clone()))?;

        let executable = install_dir
            .join("bin")
            .join(format!("{generator_name}-node"));
        if !executable.is_file() {
            return Err(ParametersError::ExecutableNotFound(executable));
        }

        if !request.output_base.is_absolute() {
            return Err(ParametersError::RelativeOutputPath(
                request.output_base.clone(),
            ));
        }

        if !(request.scaling_factor > 0.0) {
            return Err(ParametersError::NonPositiveScalingFactor(
                request.scaling_factor,
            ));
        }
        if request.partition_index >= request.partition_count {
            return Err(ParametersError::PartitionIndexOutOfRange {
                index: request.partition_index,
                count: request.partition_count,
            });
        }

        let output_file = resolve_output_file(&install_dir, &generator_name, stage)?;

        Ok(Self {
            install_dir,
            executable,
            generator_name,
            output_base: request.output_base.clone(),
            dataset_id: request.dataset_id.clone(),
            stage: stage.to_string(),
            output_file,
            scaling_factor: request.scaling_factor,
            partition_count: request.partition_count,
            partition_index: request.partition_index,
        })
    }

    /// Derive a sibling parameter set for another partition of the same task.
    pub fn for_partition(&self, index: u16) -> Result<Self, ParametersError> {
        if index >= self.partition_count {
            return Err(ParametersError::PartitionIndexOutOfRange {
                index,
                count: self.partition_count,
            });
        }
        let mut params = self.clone();
        params.partition_index = index;
        Ok(params)
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Full path of the generator node executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Name of the generator, derived from the install directory name.
    pub fn generator_name(&self) -> &str {
        &self.generator_name
    }

    pub fn output_base(&self) -> &Path {
        &self.output_base
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Output file name for this stage (properties override or stage name).
    pub fn output_file(&self) -> &str {
        &self.output_file
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    pub fn partition_count(&self) -> u16 {
        self.partition_count
    }

    pub fn partition_index(&self) -> u16 {
        self.partition_index
    }

    /// Path under which this stage's job output is written:
    /// `<output_base>/<dataset_id>/<output_file>`.
    pub fn job_output_path(&self) -> PathBuf {
        self.output_base
            .join(&self.dataset_id)
            .join(&self.output_file)
    }
}

/// Resolve the stage's output file name.
///
/// `<install>/config/<name>-node.properties` may override it via the
/// `generator.<stage>.output-file` key; the stage name is the default. A
/// missing properties file is fine, an unreadable one is an error.
fn resolve_output_file(
    install_dir: &Path,
    generator_name: &str,
    stage: &str,
) -> Result<String, ParametersError> {
    let properties_path = install_dir
        .join("config")
        .join(format!("{generator_name}-node.properties"));
    if !properties_path.is_file() {
        return Ok(stage.to_string());
    }
    let props = properties::load_properties(&properties_path).map_err(|source| {
        ParametersError::PropertiesUnreadable {
            path: properties_path.clone(),
            source,
        }
    })?;
    Ok(props
        .get(&properties::output_file_key(stage))
        .cloned()
        .unwrap_or_else(|| stage.to_string()))
}
