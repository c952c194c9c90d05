// Launch Request Models

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File extensions accepted as connectivity matrix inputs
pub const MATRIX_EXTENSIONS: &[&str] = &["mat", "safetensors"];

/// Graph neural network architectures the training script understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GnnModel {
    #[serde(rename = "GCN")]
    Gcn,
    #[serde(rename = "GAT")]
    Gat,
    #[serde(rename = "GATv2")]
    GatV2,
    #[serde(rename = "GraphSAGE")]
    GraphSage,
    #[serde(rename = "GTransformer")]
    GTransformer,
}

impl GnnModel {
    pub const ALL: [GnnModel; 5] = [
        GnnModel::Gcn,
        GnnModel::Gat,
        GnnModel::GatV2,
        GnnModel::GraphSage,
        GnnModel::GTransformer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GnnModel::Gcn => "GCN",
            GnnModel::Gat => "GAT",
            GnnModel::GatV2 => "GATv2",
            GnnModel::GraphSage => "GraphSAGE",
            GnnModel::GTransformer => "GTransformer",
        }
    }
}

impl std::fmt::Display for GnnModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GnnModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        GnnModel::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownModel(s.to_string()))
    }
}

/// Convert a set of connectivity matrix files with the conversion script
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub script: String,
    pub inputs: Vec<PathBuf>,
    pub labels: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// Overrides the configured argument template
    pub args_template: Option<String>,
}

impl ConversionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.script.trim().is_empty() {
            return Err(DomainError::MissingScript("conversion".to_string()));
        }
        if self.inputs.is_empty() {
            return Err(DomainError::NoInputs);
        }
        Ok(())
    }
}

/// Train a model on a converted dataset, locally or through SLURM
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub script: String,
    pub dataset_dir: String,
    pub model: GnnModel,
    /// Overrides the configured argument template
    pub args_template: Option<String>,
    /// Overrides `slurm.use_slurm_by_default`
    pub use_slurm: Option<bool>,
    /// Existing job script whose command line is replaced
    pub sbatch_template: Option<PathBuf>,
}

impl TrainingRequest {
    pub fn new(script: impl Into<String>, dataset_dir: impl Into<String>, model: GnnModel) -> Self {
        Self {
            script: script.into(),
            dataset_dir: dataset_dir.into(),
            model,
            args_template: None,
            use_slurm: None,
            sbatch_template: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.script.trim().is_empty() {
            return Err(DomainError::MissingScript("training".to_string()));
        }
        if self.dataset_dir.trim().is_empty() {
            return Err(DomainError::MissingDataset);
        }
        Ok(())
    }
}

/// What a launch resolves to before anything is executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchPlan {
    /// Run the command here, streaming its output
    Local {
        command: String,
        working_dir: PathBuf,
    },
    /// Write a job script around the command and hand it to the scheduler
    Slurm {
        command: String,
        template: Option<PathBuf>,
    },
}

impl LaunchPlan {
    pub fn command(&self) -> &str {
        match self {
            LaunchPlan::Local { command, .. } | LaunchPlan::Slurm { command, .. } => command,
        }
    }
}

/// True when the path has one of [`MATRIX_EXTENSIONS`] (case-insensitive)
pub fn is_matrix_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| MATRIX_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Drop repeated inputs, keeping first occurrence order
pub fn dedup_inputs(inputs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    inputs
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}
