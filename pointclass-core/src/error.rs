//! Error types for pointclass

use thiserror::Error;

/// Main error type for pointclass operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Invalid regularization: {0}")]
    InvalidRegularization(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for pointclass operations
pub type Result<T> = std::result::Result<T, Error>;
