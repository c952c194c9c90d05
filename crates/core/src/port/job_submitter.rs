// Job Submitter Port
// Hands a finished job script to the cluster scheduler

use crate::port::command_runner::ExecutionError;
use async_trait::async_trait;
use std::path::Path;

/// Scheduler response to one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Scheduler job id, when the response could be parsed
    pub job_id: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Submission {
    pub fn accepted(&self) -> bool {
        self.exit_code == 0
    }
}

/// Parse `Submitted batch job <id>` out of sbatch output
pub fn parse_job_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Submitted batch job")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}

#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Submit a job script
    ///
    /// A non-zero scheduler exit code is returned as a `Submission`, not an
    /// error; errors mean the scheduler could not be invoked at all.
    async fn submit(&self, script: &Path) -> Result<Submission, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Mock submitter: records scripts, answers with a fixed job id
    pub struct MockJobSubmitter {
        response: Submission,
        submitted: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl MockJobSubmitter {
        pub fn new_accepting(job_id: impl Into<String>) -> Self {
            let job_id = job_id.into();
            Self {
                response: Submission {
                    stdout: format!("Submitted batch job {}\n", job_id),
                    job_id: Some(job_id),
                    exit_code: 0,
                    stderr: String::new(),
                },
                submitted: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn submitted(&self) -> Vec<PathBuf> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobSubmitter for MockJobSubmitter {
        async fn submit(&self, script: &Path) -> Result<Submission, ExecutionError> {
            self.submitted.lock().unwrap().push(script.to_path_buf());
            Ok(self.response.clone())
        }
    }
}
