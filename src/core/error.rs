//! Error types for online multiclass training

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LearnError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Duplicate class: {0}")]
    DuplicateClass(String),

    #[error("Numerically degenerate input: {0}")]
    NumericDegenerate(String),

    #[error("Dimension mismatch: expected at most {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Length mismatch: {features} feature vectors, {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Binary solver failed: {0}")]
    Solver(String),
}

pub type Result<T> = std::result::Result<T, LearnError>;
