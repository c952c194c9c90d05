// gnnlaunch Infrastructure - System Adapters
// Implements: CommandRunner, JobSubmitter, JobScriptStore

pub mod fs_script_store;
pub mod sbatch_submitter;
pub mod shell_executor;

pub use fs_script_store::FsJobScriptStore;
pub use sbatch_submitter::SbatchSubmitter;
pub use shell_executor::ShellExecutor;
