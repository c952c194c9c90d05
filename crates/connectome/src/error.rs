//! Converter errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectomeError {
    #[error("matrix must be square, got {rows}×{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("proportion must be within [0, 1], got {0}")]
    InvalidProportion(f64),

    #[error("expected {expected} labels (one per graph), got {got}")]
    LabelCountMismatch { expected: usize, got: usize },

    #[error("no labelled graphs left after dropping NaN labels")]
    NoGraphs,

    #[error("inputs disagree on node count: {first} vs {other}")]
    NodeCountMismatch { first: usize, other: usize },

    #[error("tensor {name}: {reason}")]
    BadTensor { name: String, reason: String },

    #[error("array shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("{path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConnectomeError>;
