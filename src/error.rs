//! Error types for adaptrank

use thiserror::Error;

/// Crate-wide error type.
///
/// Failures inside one candidate's evaluation (`SolverFailure`,
/// `Computation`) are contained by the cross-validator; setup failures
/// (`Data`, `Validation`, `MissingHyperparameter`) propagate to the caller.
#[derive(Error, Debug)]
pub enum AdaptError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Transport solver failed: {0}")]
    SolverFailure(String),

    #[error("Numeric computation failed: {0}")]
    Computation(String),

    #[error("Missing hyperparameter '{key}' for algorithm '{algo}'")]
    MissingHyperparameter { algo: String, key: String },

    #[error("Search history is empty: every candidate failed or none were evaluated")]
    EmptySearchHistory,

    #[error("Model is not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AdaptError>;
