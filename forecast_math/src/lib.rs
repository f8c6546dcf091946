//! # Forecast Math
//!
//! Numeric building blocks for yearly energy forecasts.
//! This crate fits simple trend forecasters over `(relative time, value)`
//! pairs and scores forecasts against observed values. It performs no I/O.

use thiserror::Error;

pub mod metrics;
pub mod trend;

pub use metrics::{
    mean_absolute_error, mean_squared_error, r2_score, root_mean_squared_error,
};
pub use trend::{DriftTrend, LinearTrend};

/// Errors that can occur while fitting or scoring a forecaster
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecast math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Check that two slices pair up and hold only finite values
pub(crate) fn validate_pairs(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Length mismatch: {} time points but {} values",
            x.len(),
            y.len()
        )));
    }

    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Input contains NaN or infinite values".to_string(),
        ));
    }

    Ok(())
}

/// Number of distinct time points, treating values closer than 1e-9 as equal
pub(crate) fn distinct_points(x: &[f64]) -> usize {
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    sorted.len()
}
