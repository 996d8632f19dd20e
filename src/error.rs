//! Error types for the panel feature pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PanelError>;

/// Main error type for the feature pipeline
///
/// Schema and configuration problems are fatal and raised before any feature is
/// computed. Short entity histories are not errors: they surface as null
/// feature values.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Missing required column: {0}")]
    MissingRequiredColumn(String),

    #[error("Invalid horizon {horizon} (panel spans {span_weeks} weeks): {reason}")]
    InvalidHorizon {
        horizon: usize,
        span_weeks: i64,
        reason: String,
    },

    #[error("Duplicate observation for entity {entity} in week {week}")]
    DuplicateObservation { entity: String, week: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for PanelError {
    fn from(err: polars::error::PolarsError) -> Self {
        PanelError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PanelError {
    fn from(err: serde_json::Error) -> Self {
        PanelError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PanelError {
    fn from(err: ndarray::ShapeError) -> Self {
        PanelError::ShapeError {
            expected: "rows x features".to_string(),
            actual: err.to_string(),
        }
    }
}
