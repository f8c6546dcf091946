//! Random walk with drift for yearly series

use crate::error::Result;
use crate::models::{check_finite, ForecastModel, TrainedForecastModel};
use forecast_math::DriftTrend;

/// Extends the latest observation by the average historical change
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftModel;

impl ForecastModel for DriftModel {
    type Trained = DriftTrend;

    fn train(&self, times: &[f64], values: &[f64]) -> Result<Self::Trained> {
        Ok(DriftTrend::fit(times, values)?)
    }

    fn name(&self) -> &str {
        "Drift"
    }
}

impl TrainedForecastModel for DriftTrend {
    fn predict_at(&self, relative_time: f64) -> Result<f64> {
        check_finite(self.predict(relative_time), "Drift")
    }

    fn name(&self) -> &str {
        "Drift"
    }
}
