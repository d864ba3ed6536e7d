use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::stages::delta::BoundaryPolicy;

/// Settings for a full pipeline run.
///
/// Can be stored as JSON on disk:
/// ```json
/// {
///   "inputs": ["turnstile_030617.txt", "turnstile_100617.txt"],
///   "work_dir": "out",
///   "boundary": { "sentinel": 1 },
///   "sort_before_reduce": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub inputs: Vec<PathBuf>,
    pub work_dir: PathBuf,
    pub boundary: BoundaryPolicy,
    pub sort_before_reduce: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            work_dir: PathBuf::from("."),
            boundary: BoundaryPolicy::default(),
            sort_before_reduce: false,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Rejects configs where an input would be overwritten by a stage output.
    pub fn validate(&self) -> Result<()> {
        let outputs = [
            self.master_path(),
            self.derived_path(),
            self.mapper_path(),
            self.sorted_path(),
            self.reducer_path(),
        ];
        if let Some(clash) = self.inputs.iter().find(|i| outputs.contains(i)) {
            return Err(PipelineError::Config(format!(
                "input '{}' is also a pipeline output",
                clash.display()
            )));
        }
        Ok(())
    }

    pub fn master_path(&self) -> PathBuf {
        self.work_dir.join("master_turnstile_file.csv")
    }

    pub fn derived_path(&self) -> PathBuf {
        self.work_dir.join("hourly_turnstile.csv")
    }

    pub fn mapper_path(&self) -> PathBuf {
        self.work_dir.join("mapper_result.txt")
    }

    pub fn sorted_path(&self) -> PathBuf {
        self.work_dir.join("mapper_result_sorted.txt")
    }

    pub fn reducer_path(&self) -> PathBuf {
        self.work_dir.join("reducer_result.txt")
    }
}
