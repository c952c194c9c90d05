//! Shell executor behavior against real child processes.

use gnnlaunch_core::application::{shutdown_channel, ShutdownToken};
use gnnlaunch_core::port::time_provider::SystemTimeProvider;
use gnnlaunch_core::port::{
    output_channel, CommandRunner, CommandSpec, OutputLine, RunOutcome, RunStatus, Stream,
};
use gnnlaunch_infra_system::ShellExecutor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn executor() -> ShellExecutor {
    ShellExecutor::new(Arc::new(SystemTimeProvider))
}

/// Run to completion and collect every forwarded line
async fn run(spec: CommandSpec) -> (RunOutcome, Vec<OutputLine>) {
    let (sink, mut rx) = output_channel();
    let outcome = executor()
        .run(&spec, sink, ShutdownToken::never())
        .await
        .unwrap();
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    (outcome, lines)
}

fn joined(lines: &[OutputLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_success_output_and_code() {
    let (outcome, lines) = run(CommandSpec::new(r#"echo "Success!""#)).await;

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(lines, vec![OutputLine::stdout("Success!")]);
}

#[tokio::test]
async fn test_failure_code_and_stderr() {
    let (outcome, lines) = run(CommandSpec::new(r#">&2 echo "An error occurred" && exit 123"#)).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.reported_code(), 123);
    assert!(lines
        .iter()
        .any(|l| l.stream == Stream::Stderr && l.text == "An error occurred"));
}

#[tokio::test]
async fn test_working_directory() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("new_file.txt");
    assert!(!target.exists());

    let (outcome, _) = run(CommandSpec::new(r#"touch "new_file.txt""#).in_dir(temp.path())).await;

    assert_eq!(outcome.exit_code, Some(0));
    assert!(target.exists());
}

#[tokio::test]
async fn test_command_not_found() {
    let (outcome, lines) = run(CommandSpec::new("this_command_does_not_exist_12345")).await;

    assert_eq!(outcome.exit_code, Some(127));
    assert!(joined(&lines).to_lowercase().contains("not found"));
}

#[tokio::test]
async fn test_lines_arrive_while_running() {
    let (sink, mut rx) = output_channel();
    let spec = CommandSpec::new("echo first; sleep 1; echo second");

    let handle = tokio::spawn(async move {
        executor()
            .run(&spec, sink, ShutdownToken::never())
            .await
            .unwrap()
    });

    let first = tokio::time::timeout(Duration::from_millis(800), rx.recv())
        .await
        .expect("first line before the child exits")
        .unwrap();
    assert_eq!(first.text, "first");
    assert!(!handle.is_finished());

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.line_count, 2);
    assert_eq!(rx.recv().await.unwrap().text, "second");
}

#[tokio::test]
async fn test_shutdown_terminates_process_group() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("survived");
    let spec = CommandSpec::new(format!(
        "(sleep 2 && touch {}) & wait",
        marker.display()
    ));
    let (sink, _rx) = output_channel();
    let (tx, token) = shutdown_channel();

    let handle = tokio::spawn(async move { executor().run(&spec, sink, token).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.shutdown();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.status, RunStatus::Killed);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!marker.exists(), "background child outlived the shutdown");
}

#[tokio::test]
async fn test_extra_environment() {
    let mut spec = CommandSpec::new("echo \"$GNNLAUNCH_IT_VALUE\"");
    spec.env
        .insert("GNNLAUNCH_IT_VALUE".to_string(), "from the command".to_string());

    let (_, lines) = run(spec).await;

    assert_eq!(joined(&lines), "from the command");
}
