// Live output of a launch and its final report

use anyhow::Result;
use colored::Colorize;
use std::future::Future;
use std::path::Path;
use tracing::warn;

use gnnlaunch_core::application::{shutdown_channel, LaunchOutcome, ShutdownToken};
use gnnlaunch_core::port::{output_channel, OutputLine, OutputSink, RunStatus, Stream, Submission};

/// Exit code the CLI returns for an interrupted run (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Fallback for a child killed by a signal or a code outside `0..=255`
const FAILURE_EXIT_CODE: u8 = 1;

/// The child's exit code as the CLI's own
pub fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(FAILURE_EXIT_CODE)
}

fn print_line(line: &OutputLine) {
    match line.stream {
        Stream::Stdout => println!("{}", line.text),
        Stream::Stderr => eprintln!("{}", line.text),
    }
}

/// Run a launch while echoing its output as it arrives
///
/// Ctrl-C asks the running child to stop; the child's exit code becomes
/// the CLI's exit code.
pub async fn launch<F, Fut>(command: &str, start: F) -> Result<u8>
where
    F: FnOnce(OutputSink, ShutdownToken) -> Fut,
    Fut: Future<Output = gnnlaunch_core::Result<LaunchOutcome>>,
{
    let (sink, mut rx) = output_channel();
    let (shutdown_tx, token) = shutdown_channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the running process");
            shutdown_tx.shutdown();
        }
    });

    println!("{}", format!("$ {command}").bold());
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            print_line(&line);
        }
    });

    let outcome = start(sink, token).await;
    // Sink is dropped once the launch returns; drain what is left
    let _ = printer.await;

    match outcome? {
        LaunchOutcome::Completed { run, .. } => {
            let code = run.reported_code();
            let summary = format!("Process finished with code {code}");
            match run.status {
                RunStatus::Success => println!("{}", summary.green()),
                RunStatus::Failed => println!("{}", summary.red()),
                RunStatus::Timeout => println!("{} {}", summary.red(), "(timed out)".red()),
                RunStatus::Killed => {
                    println!("{} {}", summary.yellow(), "(interrupted)".yellow());
                    return Ok(INTERRUPTED_EXIT_CODE);
                }
            }
            Ok(exit_code(code))
        }
        LaunchOutcome::Submitted {
            script, submission, ..
        } => Ok(report_submission(&script, &submission)),
    }
}

/// Print the scheduler's answer; returns sbatch's exit code
pub fn report_submission(script: &Path, submission: &Submission) -> u8 {
    println!("{} {}", "Job script:".bold(), script.display());
    if submission.accepted() {
        let id = submission.job_id.as_deref().unwrap_or("?");
        println!("{}", format!("✓ Submitted batch job {id}").green().bold());
    } else {
        println!(
            "{}",
            format!("✗ sbatch exited with code {}", submission.exit_code)
                .red()
                .bold()
        );
        if !submission.stderr.trim().is_empty() {
            eprintln!("{}", submission.stderr.trim_end());
        }
    }
    exit_code(submission.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnnlaunch_core::port::RunOutcome;
    use std::path::PathBuf;

    fn completed(status: RunStatus, exit_code: Option<i32>) -> LaunchOutcome {
        LaunchOutcome::Completed {
            command: "python train.py".to_string(),
            run: RunOutcome {
                status,
                exit_code,
                duration_ms: 5,
                line_count: 1,
            },
        }
    }

    fn submission(exit_code: i32) -> Submission {
        Submission {
            job_id: (exit_code == 0).then(|| "4242".to_string()),
            exit_code,
            stdout: String::new(),
            stderr: "sbatch: error: invalid partition".to_string(),
        }
    }

    #[test]
    fn test_exit_code_mirrors_child_or_falls_back() {
        assert_eq!(exit_code(0), 0);
        assert_eq!(exit_code(127), 127);
        assert_eq!(exit_code(-1), 1);
        assert_eq!(exit_code(300), 1);
    }

    #[tokio::test]
    async fn test_launch_reports_child_exit_code() {
        let code = launch("python train.py", |sink, _token| async move {
            let _ = sink.send(OutputLine::stdout("epoch 1"));
            Ok(completed(RunStatus::Failed, Some(3)))
        })
        .await
        .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_interrupted_launch_exits_130() {
        let code = launch("python train.py", |_sink, _token| async move {
            Ok(completed(RunStatus::Killed, None))
        })
        .await
        .unwrap();
        assert_eq!(code, 130);
    }

    #[tokio::test]
    async fn test_launch_error_propagates() {
        let result = launch("python train.py", |_sink, _token| async move {
            Err(gnnlaunch_core::AppError::Busy("python other.py".to_string()))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_submitted_launch_uses_sbatch_code() {
        let code = launch("python train.py", |_sink, _token| async move {
            Ok(LaunchOutcome::Submitted {
                command: "python train.py".to_string(),
                script: PathBuf::from("/jobs/gnn_job.sh"),
                submission: submission(0),
            })
        })
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_report_submission_exit_codes() {
        let script = Path::new("/jobs/gnn_job_20250101-120000.sh");
        assert_eq!(report_submission(script, &submission(0)), 0);
        assert_eq!(report_submission(script, &submission(1)), 1);
    }
}
