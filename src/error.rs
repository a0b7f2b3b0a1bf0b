//! Error types for the feature derivation engine

use thiserror::Error;

/// Result type alias for feature operations
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Main error type for the feature engine
///
/// Every variant is raised before any output column is assembled, so a
/// failed transform never yields a partially enriched table.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Irregular grid between {previous} and {current}: {reason}")]
    IrregularGrid {
        previous: String,
        current: String,
        reason: String,
    },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Invalid lag for '{variable}': {lag} (lags must reference strictly past rows)")]
    InvalidLag { variable: String, lag: i64 },

    #[error("Insufficient history for '{feature}': row {row} at {timestamp} needs {required} prior steps")]
    InsufficientHistory {
        feature: String,
        row: usize,
        timestamp: String,
        required: usize,
    },

    #[error("Specification conflict: derived column '{0}' is declared more than once or shadows a source variable")]
    SpecificationConflict(String),

    #[error("Invalid window for '{variable}': {reason}")]
    InvalidWindow { variable: String, reason: String },

    #[error("Invalid grid step: {0}")]
    InvalidStep(String),

    #[error("Unsorted index: {current} follows {previous}")]
    UnsortedIndex { previous: String, current: String },

    #[error("Duplicate timestamp: {0}")]
    DuplicateTimestamp(String),

    #[error("Column '{column}' has {count} missing values")]
    MissingValues { column: String, count: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Column '{column}' has non-numeric type {dtype}")]
    NonNumericColumn { column: String, dtype: String },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for FeatureError {
    fn from(err: polars::error::PolarsError) -> Self {
        FeatureError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FeatureError {
    fn from(err: serde_json::Error) -> Self {
        FeatureError::SerializationError(err.to_string())
    }
}
