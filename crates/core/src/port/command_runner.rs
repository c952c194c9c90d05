// Command Runner Port
// Abstraction for running one shell command with live output streaming

use crate::application::shutdown::ShutdownToken;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of child output, without its trailing newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }
}

/// Receiving end of the live output channel
pub type OutputSink = mpsc::UnboundedSender<OutputLine>;

/// Create a live output channel
pub fn output_channel() -> (OutputSink, mpsc::UnboundedReceiver<OutputLine>) {
    mpsc::unbounded_channel()
}

/// What to run
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Full shell command line (handed to `bash -c`)
    pub command: String,
    pub working_dir: Option<PathBuf>,
    /// Extra variables layered over the inherited environment
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Final status of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
    Timeout,
    Killed,
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub line_count: usize,
}

impl RunOutcome {
    /// Exit code to report; `-1` when the child died from a signal
    pub fn reported_code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Command Runner trait
///
/// Implementations:
/// - ShellExecutor: `bash -c` child process with piped output
/// - MockCommandRunner: scripted output for tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, pushing each output line into `sink`
    ///
    /// Stops the child when `shutdown` fires or its timeout elapses;
    /// both are reported through `RunOutcome::status`, not as errors.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the shell cannot be started
    /// - ExecutionError::IoError if waiting on the child fails
    async fn run(
        &self,
        spec: &CommandSpec,
        sink: OutputSink,
        shutdown: ShutdownToken,
    ) -> Result<RunOutcome, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock Command Runner: emits fixed lines, returns a fixed exit code
    pub struct MockCommandRunner {
        lines: Vec<OutputLine>,
        exit_code: i32,
        delay: Option<Duration>,
        commands: Arc<Mutex<Vec<CommandSpec>>>,
    }

    impl MockCommandRunner {
        pub fn new(lines: Vec<OutputLine>, exit_code: i32) -> Self {
            Self {
                lines,
                exit_code,
                delay: None,
                commands: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(vec![OutputLine::stdout("mock output")], 0)
        }

        /// Hold each run open for `delay` (for exclusivity tests)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Every command this runner was asked to run
        pub fn commands(&self) -> Vec<CommandSpec> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for MockCommandRunner {
        async fn run(
            &self,
            spec: &CommandSpec,
            sink: OutputSink,
            _shutdown: ShutdownToken,
        ) -> Result<RunOutcome, ExecutionError> {
            self.commands.lock().unwrap().push(spec.clone());

            for line in &self.lines {
                let _ = sink.send(line.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            Ok(RunOutcome {
                status: if self.exit_code == 0 {
                    RunStatus::Success
                } else {
                    RunStatus::Failed
                },
                exit_code: Some(self.exit_code),
                duration_ms: 1,
                line_count: self.lines.len(),
            })
        }
    }
}
