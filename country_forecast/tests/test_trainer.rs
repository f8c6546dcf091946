use approx::assert_relative_eq;
use country_forecast::data::Record;
use country_forecast::error::Result;
use country_forecast::features::TimeReference;
use country_forecast::models::ModelKind;
use country_forecast::partition::{PartitionKey, PartitionSplitter, SkipReason};
use country_forecast::registry::{ForecastArtifact, InMemoryModelStore, ModelStore};
use country_forecast::trainer::{FailureStage, ForecastTrainer};
use country_forecast::ForecastError;
use rstest::rstest;
use std::collections::{BTreeMap, HashMap};

const REFERENCE_YEAR: i32 = 2000;

fn record(key: &str, year: i32, target: f64) -> Record {
    Record {
        partition: PartitionKey::new(key),
        year,
        relative_time: TimeReference::new(REFERENCE_YEAR).to_relative(year),
        target,
        features: BTreeMap::new(),
    }
}

fn linear(year: i32) -> f64 {
    10.0 + 2.0 * f64::from(year - REFERENCE_YEAR)
}

fn linear_records(key: &str, years: &[i32]) -> Vec<Record> {
    years.iter().map(|&y| record(key, y, linear(y))).collect()
}

#[rstest]
#[case(ModelKind::LinearTrend)]
#[case(ModelKind::Drift)]
fn test_train_partition_on_linear_series(#[case] kind: ModelKind) {
    let plan = PartitionSplitter::split(
        linear_records("Alpha", &[2000, 2001, 2003, 2004, 2006]),
        linear_records("Alpha", &[2002, 2005]),
    );
    let reference = TimeReference::new(REFERENCE_YEAR);

    let trained = ForecastTrainer::new(kind)
        .train_partition(plan.get("Alpha").unwrap(), &reference)
        .unwrap();

    assert!(trained.evaluation.mae < 1e-9);
    assert_relative_eq!(trained.evaluation.r2, 1.0, epsilon = 1e-9);
    assert_eq!(trained.test_predictions.len(), 2);
    assert_relative_eq!(trained.test_predictions[1], linear(2005), epsilon = 1e-9);

    assert_eq!(trained.artifact.canonical_key.as_str(), "Alpha");
    assert_eq!(trained.artifact.time_reference, reference);
    assert_eq!(trained.artifact.model_kind(), kind);
    assert_eq!(trained.artifact.evaluation, Some(trained.evaluation));
}

#[test]
fn test_one_model_and_evaluation_per_partition() {
    let mut train = linear_records("Alpha", &[2000, 2001, 2002]);
    train.extend(linear_records("Costa Rica", &[2000, 2002, 2004]));
    let mut test = linear_records("Alpha", &[2003]);
    test.extend(linear_records("Costa Rica", &[2001, 2003]));

    let plan = PartitionSplitter::split(train, test);
    let store = InMemoryModelStore::new();

    let report = ForecastTrainer::default().train_all(
        &plan,
        &TimeReference::new(REFERENCE_YEAR),
        &store,
    );

    assert_eq!(report.trained.len(), 2);
    assert!(report.failed.is_empty());
    assert!(report.skipped.is_empty());

    let saved = store.load_all().unwrap();
    assert_eq!(saved.len(), 2);
    assert!(saved.contains_key("Costa Rica"));
    assert_eq!(report.evaluation_report().len(), 2);
}

#[test]
fn test_empty_partition_does_not_affect_others() {
    let train = linear_records("Alpha", &[2000, 2001, 2002, 2004]);
    let mut test = linear_records("Alpha", &[2003]);
    test.extend(linear_records("Beta", &[2001, 2002]));

    let plan = PartitionSplitter::split(train, test);
    let store = InMemoryModelStore::new();
    let report = ForecastTrainer::default().train_all(
        &plan,
        &TimeReference::new(REFERENCE_YEAR),
        &store,
    );

    assert!(report.trained.contains_key("Alpha"));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key.as_str(), "Beta");
    assert_eq!(report.skipped[0].reason, SkipReason::EmptyTrain);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_single_year_partition_fails_alone() {
    let mut train = linear_records("Alpha", &[2000, 2001, 2002]);
    train.extend(vec![record("Flat", 2001, 5.0), record("Flat", 2001, 6.0)]);
    let mut test = linear_records("Alpha", &[2003]);
    test.push(record("Flat", 2002, 5.5));

    let plan = PartitionSplitter::split(train, test);
    let store = InMemoryModelStore::new();
    let report = ForecastTrainer::default().train_all(
        &plan,
        &TimeReference::new(REFERENCE_YEAR),
        &store,
    );

    assert!(report.trained.contains_key("Alpha"));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key.as_str(), "Flat");
    assert_eq!(report.failed[0].stage, FailureStage::Training);
    assert!(!store.load_all().unwrap().contains_key("Flat"));

    let err = ForecastTrainer::default()
        .train_partition(plan.get("Flat").unwrap(), &TimeReference::new(REFERENCE_YEAR))
        .unwrap_err();
    assert!(matches!(err, ForecastError::TrainingFailed { .. }));
}

#[test]
fn test_mismatched_time_reference_is_rejected() {
    let plan = PartitionSplitter::split(
        linear_records("Alpha", &[2000, 2001, 2002]),
        linear_records("Alpha", &[2003]),
    );

    // Records were derived against 2000, training is asked to use 1990.
    let err = ForecastTrainer::default()
        .train_partition(plan.get("Alpha").unwrap(), &TimeReference::new(1990))
        .unwrap_err();

    assert!(matches!(err, ForecastError::TrainingFailed { .. }));
}

struct FailingStore;

impl ModelStore for FailingStore {
    fn save(&self, key: &PartitionKey, _artifact: &ForecastArtifact) -> Result<()> {
        Err(ForecastError::Persistence(format!("disk full while saving {}", key)))
    }

    fn load_all(&self) -> Result<HashMap<PartitionKey, ForecastArtifact>> {
        Ok(HashMap::new())
    }

    fn remove(&self, _key: &PartitionKey) -> Result<bool> {
        Ok(false)
    }
}

#[test]
fn test_persistence_failure_is_reported_per_partition() {
    let mut train = linear_records("Alpha", &[2000, 2001]);
    train.extend(linear_records("Gamma", &[2000, 2001]));
    let mut test = linear_records("Alpha", &[2002]);
    test.extend(linear_records("Gamma", &[2002]));

    let plan = PartitionSplitter::split(train, test);
    let report =
        ForecastTrainer::default().train_all(&plan, &TimeReference::new(REFERENCE_YEAR), &FailingStore);

    assert!(report.trained.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .all(|f| f.stage == FailureStage::Persistence));
}

#[test]
fn test_retraining_removes_models_of_skipped_and_failed_partitions() {
    let reference = TimeReference::new(REFERENCE_YEAR);
    let store = InMemoryModelStore::new();

    let mut train = linear_records("Alpha", &[2000, 2001, 2002]);
    train.extend(linear_records("Beta", &[2000, 2001, 2002]));
    train.extend(linear_records("Flat", &[2000, 2001, 2002]));
    let mut test = linear_records("Alpha", &[2003]);
    test.extend(linear_records("Beta", &[2003]));
    test.extend(linear_records("Flat", &[2003]));

    let first = ForecastTrainer::default().train_all(
        &PartitionSplitter::split(train, test),
        &reference,
        &store,
    );
    assert_eq!(first.trained.len(), 3);
    assert_eq!(store.len(), 3);

    // Beta loses its train rows, Flat collapses to a single year
    let mut train = linear_records("Alpha", &[2000, 2001, 2002]);
    train.push(record("Flat", 2001, 5.0));
    let mut test = linear_records("Alpha", &[2003]);
    test.extend(linear_records("Beta", &[2003]));
    test.extend(linear_records("Flat", &[2003]));

    let second = ForecastTrainer::default().train_all(
        &PartitionSplitter::split(train, test),
        &reference,
        &store,
    );
    assert_eq!(second.trained.len(), 1);
    assert_eq!(second.skipped.len(), 1);
    assert_eq!(second.failed.len(), 1);

    let saved = store.load_all().unwrap();
    assert_eq!(saved.len(), 1);
    assert!(saved.contains_key("Alpha"));
}

struct StickyStore {
    inner: InMemoryModelStore,
}

impl ModelStore for StickyStore {
    fn save(&self, key: &PartitionKey, artifact: &ForecastArtifact) -> Result<()> {
        self.inner.save(key, artifact)
    }

    fn load_all(&self) -> Result<HashMap<PartitionKey, ForecastArtifact>> {
        self.inner.load_all()
    }

    fn remove(&self, key: &PartitionKey) -> Result<bool> {
        Err(ForecastError::Persistence(format!("read-only store, cannot remove {}", key)))
    }
}

#[test]
fn test_unremovable_stale_model_is_reported() {
    let plan = PartitionSplitter::split(
        linear_records("Alpha", &[2000, 2001, 2002]),
        linear_records("Beta", &[2003]),
    );
    let store = StickyStore {
        inner: InMemoryModelStore::new(),
    };

    let report =
        ForecastTrainer::default().train_all(&plan, &TimeReference::new(REFERENCE_YEAR), &store);

    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .all(|f| f.stage == FailureStage::Persistence));
}
