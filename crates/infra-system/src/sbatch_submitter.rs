// SLURM submitter: `sbatch <script>`
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

use gnnlaunch_core::port::job_submitter::parse_job_id;
use gnnlaunch_core::port::{ExecutionError, JobSubmitter, Submission};

const SBATCH: &str = "sbatch";

/// Submits job scripts with `sbatch`
pub struct SbatchSubmitter {
    program: String,
}

impl SbatchSubmitter {
    pub fn new() -> Self {
        Self {
            program: SBATCH.to_string(),
        }
    }

    /// Use another submission program (wrappers, tests)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SbatchSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSubmitter for SbatchSubmitter {
    async fn submit(&self, script: &Path) -> Result<Submission, ExecutionError> {
        info!(program = %self.program, script = %script.display(), "Submitting job script");

        let output = Command::new(&self.program)
            .arg(script)
            .output()
            .await
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(Submission {
            job_id: parse_job_id(&stdout),
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}
