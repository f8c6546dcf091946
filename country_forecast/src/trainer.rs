//! Per-partition training and evaluation

use crate::error::{ForecastError, Result};
use crate::features::TimeReference;
use crate::metrics::{evaluate_forecast, Evaluation, EvaluationReport};
use crate::models::{ModelKind, TrainedForecastModel};
use crate::partition::{PartitionDataset, PartitionKey, PartitionPlan, SkippedPartition};
use crate::registry::{ForecastArtifact, ModelStore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Result of training one partition
#[derive(Debug, Clone)]
pub struct TrainedPartition {
    pub artifact: ForecastArtifact,
    pub evaluation: Evaluation,
    /// Forecasts for the test subset, in test record order
    pub test_predictions: Vec<f64>,
}

/// Stage at which a partition failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Training,
    Persistence,
}

/// A partition whose model was not produced or not saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPartition {
    pub key: PartitionKey,
    pub stage: FailureStage,
    pub reason: String,
}

/// Summary of a training run
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    /// Evaluation of every partition that was trained and saved
    pub trained: BTreeMap<PartitionKey, Evaluation>,
    pub skipped: Vec<SkippedPartition>,
    pub failed: Vec<FailedPartition>,
}

impl TrainingReport {
    /// Evaluation output of the run
    pub fn evaluation_report(&self) -> EvaluationReport {
        self.trained.clone()
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training Summary:")?;
        writeln!(f, "  Trained: {}", self.trained.len())?;
        for (key, eval) in &self.trained {
            writeln!(f, "    {}: {}", key, eval)?;
        }
        writeln!(f, "  Skipped: {}", self.skipped.len())?;
        for skipped in &self.skipped {
            writeln!(f, "    {} ({})", skipped.key, skipped.reason)?;
        }
        writeln!(f, "  Failed:  {}", self.failed.len())?;
        for failed in &self.failed {
            writeln!(f, "    {} [{:?}]: {}", failed.key, failed.stage, failed.reason)?;
        }
        Ok(())
    }
}

/// Fits one forecaster per partition
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastTrainer {
    kind: ModelKind,
}

impl ForecastTrainer {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Fit on the train subset, forecast the test subset and evaluate
    ///
    /// Every error is reported as [`ForecastError::TrainingFailed`] for
    /// this partition.
    pub fn train_partition(
        &self,
        dataset: &PartitionDataset,
        reference: &TimeReference,
    ) -> Result<TrainedPartition> {
        let key = &dataset.key;
        let fail = |reason: &dyn fmt::Display| ForecastError::training_failed(key.as_str(), reason);

        for record in dataset.train.iter().chain(dataset.test.iter()) {
            if record.relative_time != reference.to_relative(record.year) {
                return Err(fail(&format!(
                    "record for {} was derived with a different time reference",
                    record.year
                )));
            }
            reference.to_date(record.relative_time).map_err(|e| fail(&e))?;
        }

        let distinct = dataset.distinct_train_years();
        if distinct < 2 {
            return Err(fail(&format!(
                "need at least 2 distinct train years, found {}",
                distinct
            )));
        }

        let (train_times, train_values) = dataset.train_series();
        let forecaster = self
            .kind
            .fit(&train_times, &train_values)
            .map_err(|e| fail(&e))?;

        let (test_times, actual) = dataset.test_series();
        let test_predictions = forecaster.predict(&test_times).map_err(|e| fail(&e))?;
        let evaluation = evaluate_forecast(&actual, &test_predictions).map_err(|e| fail(&e))?;

        info!(
            partition = %key,
            model = forecaster.name(),
            mae = evaluation.mae,
            r2 = evaluation.r2,
            "Trained partition"
        );

        let artifact = ForecastArtifact::new(key.clone(), *reference, forecaster, Some(evaluation));

        Ok(TrainedPartition {
            artifact,
            evaluation,
            test_predictions,
        })
    }

    /// Train every partition of a plan in parallel and save each artifact
    ///
    /// Failures are recorded per partition and never stop the others.
    pub fn train_all(
        &self,
        plan: &PartitionPlan,
        reference: &TimeReference,
        store: &dyn ModelStore,
    ) -> TrainingReport {
        let datasets: Vec<&PartitionDataset> = plan.datasets().collect();

        let outcomes: Vec<std::result::Result<(PartitionKey, Evaluation), FailedPartition>> =
            datasets
                .into_par_iter()
                .map(|dataset| self.train_and_save(dataset, reference, store))
                .collect();

        let mut report = TrainingReport {
            skipped: plan.skipped().to_vec(),
            ..TrainingReport::default()
        };

        for outcome in outcomes {
            match outcome {
                Ok((key, evaluation)) => {
                    report.trained.insert(key, evaluation);
                }
                Err(failed) => report.failed.push(failed),
            }
        }

        remove_stale_artifacts(&mut report, store);
        report
    }

    fn train_and_save(
        &self,
        dataset: &PartitionDataset,
        reference: &TimeReference,
        store: &dyn ModelStore,
    ) -> std::result::Result<(PartitionKey, Evaluation), FailedPartition> {
        let key = dataset.key.clone();

        let trained = self.train_partition(dataset, reference).map_err(|e| {
            warn!(partition = %key, error = %e, "Training failed");
            FailedPartition {
                key: key.clone(),
                stage: FailureStage::Training,
                reason: e.to_string(),
            }
        })?;

        store.save(&key, &trained.artifact).map_err(|e| {
            warn!(partition = %key, error = %e, "Saving model failed");
            FailedPartition {
                key: key.clone(),
                stage: FailureStage::Persistence,
                reason: e.to_string(),
            }
        })?;

        Ok((key, trained.evaluation))
    }
}

/// Drop artifacts left by earlier runs for partitions that produced no model in this one
///
/// A skipped partition whose old artifact cannot be removed is reported as
/// a persistence failure, since it would otherwise keep being served.
fn remove_stale_artifacts(report: &mut TrainingReport, store: &dyn ModelStore) {
    let mut unremoved = Vec::new();

    for skipped in &report.skipped {
        match store.remove(&skipped.key) {
            Ok(true) => info!(partition = %skipped.key, "Removed model of skipped partition"),
            Ok(false) => {}
            Err(e) => {
                warn!(partition = %skipped.key, error = %e, "Stale model could not be removed");
                unremoved.push(FailedPartition {
                    key: skipped.key.clone(),
                    stage: FailureStage::Persistence,
                    reason: e.to_string(),
                });
            }
        }
    }

    for failed in &report.failed {
        match store.remove(&failed.key) {
            Ok(true) => info!(partition = %failed.key, "Removed model of failed partition"),
            Ok(false) => {}
            Err(e) => warn!(partition = %failed.key, error = %e, "Stale model could not be removed"),
        }
    }

    report.failed.extend(unremoved);
}
