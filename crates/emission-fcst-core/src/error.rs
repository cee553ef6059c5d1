//! Error types for the alignment core.

use thiserror::Error;

/// Result type for alignment and forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error types for alignment and forecast operations.
///
/// Column collisions and missing lookup periods are not errors: the merger
/// renames colliding columns and the lookup returns
/// [`crate::lookup::Lookup::Unavailable`].
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Missing anchor: historical series '{0}' is empty")]
    MissingAnchor(String),

    #[error("Length mismatch: expected {expected} forecast values, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
