// Application Layer - Use Cases

pub mod constants;
pub mod inputs;
pub mod launcher;
pub mod shutdown;

// Re-exports
pub use launcher::{LaunchOutcome, LaunchService};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
