// Launcher Settings Model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default argument template for the conversion script
pub const DEFAULT_CONVERSION_ARGS: &str =
    "--inputs {inputs} --labels {labels} --output_dir {output_dir}";

/// Default argument template for the training script
pub const DEFAULT_TRAINING_ARGS: &str = "--data {dataset_dir} --model {model}";

/// Default SLURM job name (also the job script file prefix)
pub const DEFAULT_JOB_NAME: &str = "gnn_job";

/// Script location plus the argument template used to call it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSettings {
    #[serde(default)]
    pub script_path: String,
    #[serde(default)]
    pub default_args: String,
}

impl ScriptSettings {
    pub fn conversion() -> Self {
        Self {
            script_path: String::new(),
            default_args: DEFAULT_CONVERSION_ARGS.to_string(),
        }
    }

    pub fn training() -> Self {
        Self {
            script_path: String::new(),
            default_args: DEFAULT_TRAINING_ARGS.to_string(),
        }
    }
}

/// SLURM submission parameters
///
/// Empty strings and zero counts mean "do not emit this directive".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurmSettings {
    pub use_slurm_by_default: bool,
    pub job_name: String,
    pub output: String,
    pub error: String,
    pub account: String,
    pub partition: String,
    pub qos: String,
    pub gpus: u32,
    pub cpus: u32,
    pub mem: String,
    pub time: String,
    /// Raw extra `#SBATCH` lines, emitted verbatim
    pub additional: String,
    /// Shell line run before the command (e.g. `conda activate gnn`)
    pub env_activation: String,
}

impl Default for SlurmSettings {
    fn default() -> Self {
        Self {
            use_slurm_by_default: false,
            job_name: DEFAULT_JOB_NAME.to_string(),
            output: String::new(),
            error: String::new(),
            account: String::new(),
            partition: String::new(),
            qos: String::new(),
            gpus: 1,
            cpus: 4,
            mem: "16G".to_string(),
            time: "02:00:00".to_string(),
            additional: String::new(),
            env_activation: String::new(),
        }
    }
}

impl SlurmSettings {
    /// `job_name`, or `DEFAULT_JOB_NAME` when it is blank
    pub fn effective_job_name(&self) -> &str {
        match self.job_name.trim() {
            "" => DEFAULT_JOB_NAME,
            name => name,
        }
    }
}

/// Full launcher settings (persisted by a `SettingsRepository`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub workspace_dir: PathBuf,
    pub jobs_dir: PathBuf,
    pub logs_dir: PathBuf,
    #[serde(default = "ScriptSettings::conversion")]
    pub conversion: ScriptSettings,
    #[serde(default = "ScriptSettings::training")]
    pub training: ScriptSettings,
    #[serde(default)]
    pub slurm: SlurmSettings,
}

impl Settings {
    /// Defaults rooted at `workspace`: jobs and logs live in sub-directories
    pub fn with_workspace(workspace: impl AsRef<Path>) -> Self {
        let workspace = workspace.as_ref().to_path_buf();
        Self {
            jobs_dir: workspace.join("jobs"),
            logs_dir: workspace.join("logs"),
            workspace_dir: workspace,
            conversion: ScriptSettings::conversion(),
            training: ScriptSettings::training(),
            slurm: SlurmSettings::default(),
        }
    }

    /// Directories that must exist before anything is launched
    pub fn required_dirs(&self) -> [&Path; 3] {
        [&self.workspace_dir, &self.jobs_dir, &self.logs_dir]
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_workspace(".")
    }
}
