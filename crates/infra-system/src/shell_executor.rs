// Shell executor implementation
// reason: async-trait, tokio for async process management with live output
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use gnnlaunch_core::application::constants::{
    DEFAULT_SHELL, GRACEFUL_SHUTDOWN_TIMEOUT_MS, KILL_POLL_INTERVAL_MS,
};
use gnnlaunch_core::application::ShutdownToken;
use gnnlaunch_core::port::{
    CommandRunner, CommandSpec, ExecutionError, OutputLine, OutputSink, RunOutcome, RunStatus,
    Stream, TimeProvider,
};

/// Why the wait on the child ended
enum Stop {
    Exited(std::io::Result<ExitStatus>),
    Timeout(Duration),
    Cancelled,
}

/// Shell executor
/// Runs `bash -c <command>` and streams stdout/stderr line by line
pub struct ShellExecutor {
    time_provider: Arc<dyn TimeProvider>,
    shell: String,
    env_allowlist: Option<Vec<String>>,
}

impl ShellExecutor {
    /// Create a new shell executor (inherits the full parent environment)
    ///
    /// # Example
    /// ```ignore
    /// let executor = ShellExecutor::new(Arc::new(SystemTimeProvider));
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            shell: DEFAULT_SHELL.to_string(),
            env_allowlist: None,
        }
    }

    /// Use another POSIX shell (must accept `-c`)
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Only pass these inherited variables to the child
    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = Some(allowlist);
        self
    }

    /// Filter inherited environment variables to the allowlist
    fn filter_env(&self, env: &HashMap<String, String>) -> HashMap<String, String> {
        match &self.env_allowlist {
            Some(allow) => env
                .iter()
                .filter(|(k, _)| allow.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => env.clone(),
        }
    }

    fn build_command(&self, spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.env_allowlist.is_some() {
            let inherited: HashMap<String, String> = std::env::vars().collect();
            cmd.env_clear().envs(self.filter_env(&inherited));
        }
        cmd.envs(&spec.env);

        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        // Own process group so termination reaches the script, not just bash
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    /// SIGTERM the child's process group, SIGKILL after the grace period
    async fn terminate(&self, child: &mut Child) -> Result<ExitStatus, ExecutionError> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                let group = Pid::from_raw(pid as i32);
                info!(pid = %pid, "Sending SIGTERM to process group");
                if let Err(e) = killpg(group, Signal::SIGTERM) {
                    debug!(pid = %pid, error = %e, "SIGTERM failed (process already gone?)");
                }

                let start_time = self.time_provider.now_millis();
                loop {
                    if let Some(status) = child
                        .try_wait()
                        .map_err(|e| ExecutionError::IoError(e.to_string()))?
                    {
                        info!(pid = %pid, "Process exited after SIGTERM");
                        return Ok(status);
                    }
                    if self.time_provider.now_millis() - start_time > GRACEFUL_SHUTDOWN_TIMEOUT_MS
                    {
                        warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
                        let _ = killpg(group, Signal::SIGKILL);
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(KILL_POLL_INTERVAL_MS)).await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            child
                .start_kill()
                .map_err(|e| ExecutionError::Killed(e.to_string()))?;
        }

        child
            .wait()
            .await
            .map_err(|e| ExecutionError::IoError(e.to_string()))
    }
}

/// Push every line of `reader` into `sink`; returns the line count
async fn forward_lines<R>(reader: R, stream: Stream, sink: OutputSink) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(|c| c == '\n' || c == '\r');
        count += 1;
        // Receiver gone: keep draining so the child never blocks on a full pipe
        let _ = sink.send(OutputLine {
            stream,
            text: text.to_string(),
        });
    }
    Ok(count)
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(
        &self,
        spec: &CommandSpec,
        sink: OutputSink,
        mut shutdown: ShutdownToken,
    ) -> Result<RunOutcome, ExecutionError> {
        let start_time = self.time_provider.now_millis();

        info!(
            command = %spec.command,
            working_dir = ?spec.working_dir,
            timeout = ?spec.timeout,
            "Starting shell execution"
        );

        let mut child = self
            .build_command(spec)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::IoError("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::IoError("stderr not captured".to_string()))?;
        let out_task = tokio::spawn(forward_lines(stdout, Stream::Stdout, sink.clone()));
        let err_task = tokio::spawn(forward_lines(stderr, Stream::Stderr, sink));

        let timeout = spec.timeout;
        let deadline = async move {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };

        let stop = tokio::select! {
            res = child.wait() => Stop::Exited(res),
            _ = deadline => Stop::Timeout(timeout.unwrap_or_default()),
            _ = shutdown.wait() => Stop::Cancelled,
        };

        let (exit_status, status) = match stop {
            Stop::Exited(res) => {
                let exit = res.map_err(|e| ExecutionError::IoError(e.to_string()))?;
                let status = if exit.success() {
                    RunStatus::Success
                } else {
                    RunStatus::Failed
                };
                (exit, status)
            }
            Stop::Timeout(after) => {
                warn!(command = %spec.command, after = ?after, "Execution timed out");
                (self.terminate(&mut child).await?, RunStatus::Timeout)
            }
            Stop::Cancelled => {
                warn!(command = %spec.command, "Execution cancelled");
                (self.terminate(&mut child).await?, RunStatus::Killed)
            }
        };

        let mut line_count = 0;
        for task in [out_task, err_task] {
            line_count += task
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string()))?
                .map_err(|e| ExecutionError::IoError(e.to_string()))?;
        }

        let duration_ms = self.time_provider.now_millis() - start_time;
        let outcome = RunOutcome {
            status,
            exit_code: exit_status.code(),
            duration_ms,
            line_count,
        };

        info!(
            command = %spec.command,
            duration_ms = %duration_ms,
            exit_code = ?outcome.exit_code,
            status = ?outcome.status,
            lines = line_count,
            "Shell execution completed"
        );

        Ok(outcome)
    }
}
