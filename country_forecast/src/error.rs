//! Error types for the country_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the country_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing column or schema mismatch; aborts a run before any partition is processed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error related to data content or conversion
    #[error("Data error: {0}")]
    Data(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single partition's model could not be fitted
    #[error("Training failed for '{partition}': {reason}")]
    TrainingFailed { partition: String, reason: String },

    /// Saving or loading a model artifact failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    /// Error while encoding or decoding JSON, YAML or CSV
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    /// Wrap a fitting failure for one partition
    pub fn training_failed(partition: impl Into<String>, reason: impl ToString) -> Self {
        ForecastError::TrainingFailed {
            partition: partition.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is scoped to the whole dataset and must abort a run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ForecastError::Configuration(_) | ForecastError::Io(_) | ForecastError::Polars(_)
        )
    }
}

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ForecastError {
    fn from(err: serde_yaml::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<forecast_math::MathError> for ForecastError {
    fn from(err: forecast_math::MathError) -> Self {
        ForecastError::Data(err.to_string())
    }
}
