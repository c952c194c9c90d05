// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Missing script: please select a {0} script")]
    MissingScript(String),

    #[error("No input files: please add matrix files to convert")]
    NoInputs,

    #[error("Missing dataset: please select a dataset directory")]
    MissingDataset,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("No value for placeholder {{{0}}}")]
    UnresolvedPlaceholder(String),

    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
