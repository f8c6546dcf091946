//! Trend forecasters for yearly series
//!
//! Contains implementations of:
//! - Linear Trend (ordinary least squares)
//! - Drift Trend (random walk with drift)
//!
//! Both operate on relative time values, so the caller decides which
//! reference year `x = 0` corresponds to.

use crate::{distinct_points, validate_pairs, MathError, Result};
use serde::{Deserialize, Serialize};

/// Straight-line trend fitted by ordinary least squares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    slope: f64,
    intercept: f64,
    observations: usize,
}

impl LinearTrend {
    /// Fit a line through `(x, y)` pairs
    ///
    /// At least two distinct time points are required.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        validate_pairs(x, y)?;

        if distinct_points(x) < 2 {
            return Err(MathError::InsufficientData(
                "Need at least 2 distinct time points for a linear trend".to_string(),
            ));
        }

        let n = x.len() as f64;
        let x_mean = x.iter().sum::<f64>() / n;
        let y_mean = y.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for (&xi, &yi) in x.iter().zip(y.iter()) {
            numerator += (xi - x_mean) * (yi - y_mean);
            denominator += (xi - x_mean) * (xi - x_mean);
        }

        if denominator.abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Cannot calculate slope: x values are too similar".to_string(),
            ));
        }

        let slope = numerator / denominator;
        let intercept = y_mean - slope * x_mean;

        if !slope.is_finite() || !intercept.is_finite() {
            return Err(MathError::CalculationError(
                "Fitted coefficients are not finite".to_string(),
            ));
        }

        Ok(Self {
            slope,
            intercept,
            observations: x.len(),
        })
    }

    /// Predict the value at relative time `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Change in value per unit of relative time
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Value at relative time zero
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of observations used for the fit
    pub fn observations(&self) -> usize {
        self.observations
    }
}

/// Random walk with drift anchored at the latest observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftTrend {
    last_time: f64,
    last_value: f64,
    drift: f64,
    observations: usize,
}

impl DriftTrend {
    /// Fit the drift between the earliest and the latest observation
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        validate_pairs(x, y)?;

        if distinct_points(x) < 2 {
            return Err(MathError::InsufficientData(
                "Need at least 2 distinct time points for a drift trend".to_string(),
            ));
        }

        let mut points: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Duplicate time points at either end are averaged.
        let first_time = points[0].0;
        let last_time = points[points.len() - 1].0;
        let first_value = mean_at(&points, first_time);
        let last_value = mean_at(&points, last_time);

        let drift = (last_value - first_value) / (last_time - first_time);

        Ok(Self {
            last_time,
            last_value,
            drift,
            observations: x.len(),
        })
    }

    /// Predict the value at relative time `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.last_value + self.drift * (x - self.last_time)
    }

    /// Average change per unit of relative time
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// Relative time of the latest observation
    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    /// Number of observations used for the fit
    pub fn observations(&self) -> usize {
        self.observations
    }
}

fn mean_at(points: &[(f64, f64)], time: f64) -> f64 {
    let (sum, count) = points
        .iter()
        .filter(|(t, _)| (*t - time).abs() < 1e-9)
        .fold((0.0, 0usize), |(s, c), (_, v)| (s + v, c + 1));
    sum / count as f64
}
