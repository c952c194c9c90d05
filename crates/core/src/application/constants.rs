// Launcher constants (no magic values)

/// Graceful process shutdown timeout (5 seconds) before SIGKILL
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: i64 = 5000;

/// Poll interval while waiting for a terminated process to exit
pub const KILL_POLL_INTERVAL_MS: u64 = 100;

/// File prefix for job scripts derived from a user template
pub const TEMPLATE_JOB_PREFIX: &str = "gnn_job";

/// Shell used to interpret command lines
pub const DEFAULT_SHELL: &str = "bash";

/// Permission bits for generated job scripts (rwxr-x---)
pub const JOB_SCRIPT_MODE: u32 = 0o750;
