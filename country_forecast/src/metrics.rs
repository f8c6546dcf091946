//! Metrics for evaluating forecast performance

use crate::error::Result;
use crate::partition::PartitionKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Accuracy of one partition's model on its test subset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean Absolute Error
    #[serde(rename = "MAE")]
    pub mae: f64,
    /// Mean Squared Error
    #[serde(rename = "MSE")]
    pub mse: f64,
    /// Coefficient of determination
    #[serde(rename = "R2")]
    pub r2: f64,
}

impl std::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MAE: {:.2}, MSE: {:.2}, R²: {:.2}", self.mae, self.mse, self.r2)
    }
}

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(actual: &[f64], predicted: &[f64]) -> Result<Evaluation> {
    Ok(Evaluation {
        mae: forecast_math::mean_absolute_error(actual, predicted)?,
        mse: forecast_math::mean_squared_error(actual, predicted)?,
        r2: forecast_math::r2_score(actual, predicted)?,
    })
}

/// Evaluation output of one training run, keyed by canonical partition key
pub type EvaluationReport = BTreeMap<PartitionKey, Evaluation>;

/// Write an evaluation report as pretty JSON
pub fn write_evaluation_report<P: AsRef<Path>>(path: P, report: &EvaluationReport) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
