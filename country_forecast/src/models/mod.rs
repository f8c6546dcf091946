//! Forecasting models for yearly partition series

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Point forecast at a single relative time
    fn predict_at(&self, relative_time: f64) -> Result<f64>;

    /// Point forecasts for several relative times
    fn predict(&self, relative_times: &[f64]) -> Result<Vec<f64>> {
        relative_times.iter().map(|&t| self.predict_at(t)).collect()
    }

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on `(relative time, value)` pairs
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a partition's series
    fn train(&self, times: &[f64], values: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Forecaster family selected in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    LinearTrend,
    Drift,
}

impl ModelKind {
    /// Fit a forecaster of this kind
    pub fn fit(&self, times: &[f64], values: &[f64]) -> Result<Forecaster> {
        match self {
            ModelKind::LinearTrend => {
                Ok(Forecaster::LinearTrend(LinearTrendModel.train(times, values)?))
            }
            ModelKind::Drift => Ok(Forecaster::Drift(DriftModel.train(times, values)?)),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::LinearTrend => write!(f, "linear_trend"),
            ModelKind::Drift => write!(f, "drift"),
        }
    }
}

/// Fitted forecaster state stored inside an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Forecaster {
    LinearTrend(forecast_math::LinearTrend),
    Drift(forecast_math::DriftTrend),
}

impl Forecaster {
    /// Family this forecaster belongs to
    pub fn kind(&self) -> ModelKind {
        match self {
            Forecaster::LinearTrend(_) => ModelKind::LinearTrend,
            Forecaster::Drift(_) => ModelKind::Drift,
        }
    }
}

impl TrainedForecastModel for Forecaster {
    fn predict_at(&self, relative_time: f64) -> Result<f64> {
        match self {
            Forecaster::LinearTrend(m) => m.predict_at(relative_time),
            Forecaster::Drift(m) => m.predict_at(relative_time),
        }
    }

    fn name(&self) -> &str {
        match self {
            Forecaster::LinearTrend(m) => TrainedForecastModel::name(m),
            Forecaster::Drift(m) => TrainedForecastModel::name(m),
        }
    }
}

pub(crate) fn check_finite(value: f64, model: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ForecastError::Data(format!(
            "{} produced a non-finite forecast",
            model
        )))
    }
}

pub mod drift;
pub mod linear_trend;

pub use drift::DriftModel;
pub use linear_trend::LinearTrendModel;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names_match_fitted_state() {
        let times = [0.0, 1.0, 2.0];
        let values = [1.0, 2.0, 3.0];

        let linear = ModelKind::LinearTrend.fit(&times, &values).unwrap();
        assert_eq!(linear.kind(), ModelKind::LinearTrend);
        assert_eq!(linear.name(), ForecastModel::name(&LinearTrendModel));

        let drift = ModelKind::Drift.fit(&times, &values).unwrap();
        assert_eq!(drift.kind(), ModelKind::Drift);
        assert_eq!(drift.name(), ForecastModel::name(&DriftModel));
    }

    #[test]
    fn test_non_finite_forecast_is_rejected() {
        assert!(check_finite(f64::INFINITY, "Linear Trend").is_err());
        assert!(check_finite(f64::NAN, "Drift").is_err());
        assert_eq!(check_finite(2.5, "Drift").unwrap(), 2.5);
    }
}
