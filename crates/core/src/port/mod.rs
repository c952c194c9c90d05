// Port Layer - Interfaces for external dependencies

pub mod command_runner;
pub mod job_submitter;
pub mod script_store;
pub mod settings_repository;
pub mod time_provider;

// Re-exports
pub use command_runner::{
    output_channel, CommandRunner, CommandSpec, ExecutionError, OutputLine, OutputSink,
    RunOutcome, RunStatus, Stream,
};
pub use job_submitter::{JobSubmitter, Submission};
pub use script_store::JobScriptStore;
pub use settings_repository::SettingsRepository;
pub use time_provider::TimeProvider;
