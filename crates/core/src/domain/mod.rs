// Domain Layer - Pure launch logic and entities

pub mod error;
pub mod job_script;
pub mod launch;
pub mod settings;
pub mod template;

// Re-exports
pub use error::DomainError;
pub use launch::{ConversionRequest, GnnModel, LaunchPlan, TrainingRequest};
pub use settings::{ScriptSettings, Settings, SlurmSettings};
pub use template::{ArgTemplate, Placeholders};
