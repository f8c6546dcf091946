//! Linear trend model for yearly series

use crate::error::Result;
use crate::models::{check_finite, ForecastModel, TrainedForecastModel};
use forecast_math::LinearTrend;

/// Least-squares trend line over relative time
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrendModel;

impl ForecastModel for LinearTrendModel {
    type Trained = LinearTrend;

    fn train(&self, times: &[f64], values: &[f64]) -> Result<Self::Trained> {
        Ok(LinearTrend::fit(times, values)?)
    }

    fn name(&self) -> &str {
        "Linear Trend"
    }
}

impl TrainedForecastModel for LinearTrend {
    fn predict_at(&self, relative_time: f64) -> Result<f64> {
        check_finite(self.predict(relative_time), "Linear Trend")
    }

    fn name(&self) -> &str {
        "Linear Trend"
    }
}
