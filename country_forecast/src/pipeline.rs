//! End-to-end preprocessing and training runs

use crate::config::PipelineConfig;
use crate::data::{DataLoader, EnergyTable};
use crate::error::Result;
use crate::features::{derive_relative_time, TimeReference};
use crate::metrics::write_evaluation_report;
use crate::partition::PartitionSplitter;
use crate::registry::{FsModelStore, ModelStore};
use crate::split::{random_split, write_records_csv};
use crate::trainer::{ForecastTrainer, TrainingReport};
use tracing::info;

/// Row counts written by [`preprocess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub filled_targets: usize,
}

/// Raw CSV to train/test CSVs: mean-fill the target, then split with the configured seed
pub fn preprocess(config: &PipelineConfig) -> Result<PreprocessSummary> {
    let mut raw = DataLoader::from_csv(&config.data.raw_path, &config.columns)?;
    let filled_targets = raw.fill_missing_target_with_mean()?;

    let reference = TimeReference::from_tables(&[&raw])?;
    derive_relative_time(&mut raw, &reference)?;
    let records = raw.records()?;

    let (train, test) = random_split(&records, config.split.test_ratio, config.split.seed)?;
    write_records_csv(&config.data.train_path, &train, &config.columns)?;
    write_records_csv(&config.data.test_path, &test, &config.columns)?;

    info!(
        train = train.len(),
        test = test.len(),
        filled_targets,
        "Preprocessing complete"
    );

    Ok(PreprocessSummary {
        train_rows: train.len(),
        test_rows: test.len(),
        filled_targets,
    })
}

/// Shared reference year for a pair of splits
///
/// A configured `time_reference` wins; otherwise the minimum year over
/// both tables is used.
pub fn resolve_time_reference(
    config: &PipelineConfig,
    train: &EnergyTable,
    test: &EnergyTable,
) -> Result<TimeReference> {
    match config.time_reference {
        Some(year) => Ok(TimeReference::new(year)),
        None => TimeReference::from_tables(&[train, test]),
    }
}

/// Train every partition from already loaded tables and save to `store`
pub fn train_tables(
    config: &PipelineConfig,
    mut train: EnergyTable,
    mut test: EnergyTable,
    store: &dyn ModelStore,
) -> Result<TrainingReport> {
    let reference = resolve_time_reference(config, &train, &test)?;
    derive_relative_time(&mut train, &reference)?;
    derive_relative_time(&mut test, &reference)?;

    let plan = PartitionSplitter::split(train.records()?, test.records()?);
    info!(
        partitions = plan.len(),
        skipped = plan.skipped().len(),
        minimum_year = reference.minimum_year(),
        "Partitioned dataset"
    );

    let trainer = ForecastTrainer::new(config.model.kind);
    Ok(trainer.train_all(&plan, &reference, store))
}

/// Load the configured train/test CSVs, train, save models and write the evaluation report
pub fn train(config: &PipelineConfig) -> Result<TrainingReport> {
    let train = DataLoader::from_csv(&config.data.train_path, &config.columns)?;
    let test = DataLoader::from_csv(&config.data.test_path, &config.columns)?;

    let store = FsModelStore::new(&config.model.dir);
    let report = train_tables(config, train, test, &store)?;

    write_evaluation_report(&config.evaluation_path, &report.evaluation_report())?;
    info!(
        trained = report.trained.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        path = %config.evaluation_path.display(),
        "Training run complete"
    );

    Ok(report)
}
