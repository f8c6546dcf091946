use approx::assert_relative_eq;
use country_forecast::config::PipelineConfig;
use country_forecast::data::{DataLoader, Record};
use country_forecast::features::TimeReference;
use country_forecast::models::ModelKind;
use country_forecast::partition::{PartitionKey, PartitionSplitter, SkipReason};
use country_forecast::pipeline;
use country_forecast::registry::{FsModelStore, InMemoryModelStore, ModelStore};
use country_forecast::server::{ForecastServer, ServeError, ServerState};
use country_forecast::trainer::ForecastTrainer;
use rstest::rstest;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "Country,Year,Renewable Energy Share (%)";

fn linear(year: i32) -> f64 {
    10.0 + 2.0 * f64::from(year - 2000)
}

fn write_rows(path: &Path, rows: &[(&str, i32)]) {
    let mut text = format!("{}\n", HEADER);
    for (country, year) in rows {
        text.push_str(&format!("{},{},{}\n", country, year, linear(*year)));
    }
    fs::write(path, text).unwrap();
}

fn config_in(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data.raw_path = dir.join("raw.csv");
    config.data.train_path = dir.join("train.csv");
    config.data.test_path = dir.join("test.csv");
    config.model.dir = dir.join("models");
    config.evaluation_path = dir.join("models").join("evaluation.json");
    config
}

fn write_alpha_beta(config: &PipelineConfig) {
    write_rows(
        &config.data.train_path,
        &[
            ("Alpha", 2000),
            ("Alpha", 2001),
            ("Alpha", 2003),
            ("Alpha", 2004),
            ("Alpha", 2006),
        ],
    );
    write_rows(
        &config.data.test_path,
        &[("Alpha", 2002), ("Alpha", 2005), ("Beta", 2003)],
    );
}

#[test]
fn test_train_and_serve_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    write_alpha_beta(&config);

    let report = pipeline::train(&config).unwrap();

    assert_eq!(report.trained.len(), 1);
    assert!(report.trained["Alpha"].mae < 1e-6);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key.as_str(), "Beta");
    assert_eq!(report.skipped[0].reason, SkipReason::EmptyTrain);
    assert!(report.failed.is_empty());

    // Evaluation report holds only the trained partition
    let evaluation: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(&config.evaluation_path).unwrap()).unwrap();
    assert_eq!(evaluation.keys().collect::<Vec<_>>(), vec!["Alpha"]);
    assert!(evaluation["Alpha"]["MAE"].as_f64().unwrap() < 1e-6);

    let store = FsModelStore::new(&config.model.dir);
    let server = ForecastServer::start(&store);
    assert_eq!(server.state(), ServerState::Ready);

    let prediction = server.predict("Alpha", 2005).unwrap();
    assert_relative_eq!(prediction.predicted_value, 20.0, epsilon = 1e-6);

    assert!(matches!(
        server.predict("Beta", 2005),
        Err(ServeError::NotFound { .. })
    ));
    assert!(matches!(
        server.predict("Gamma", 2005),
        Err(ServeError::NotFound { .. })
    ));
}

#[test]
fn test_serving_uses_training_time_reference() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    // Test set holds the earliest year, so the reference comes from it
    write_rows(
        &config.data.train_path,
        &[("Alpha", 2003), ("Alpha", 2004), ("Alpha", 2006)],
    );
    write_rows(&config.data.test_path, &[("Alpha", 2001), ("Alpha", 2005)]);

    let train = DataLoader::from_csv(&config.data.train_path, &config.columns).unwrap();
    let test = DataLoader::from_csv(&config.data.test_path, &config.columns).unwrap();
    let reference = pipeline::resolve_time_reference(&config, &train, &test).unwrap();
    assert_eq!(reference, TimeReference::new(2001));

    let store = InMemoryModelStore::new();
    let report = pipeline::train_tables(&config, train, test, &store).unwrap();
    assert_eq!(report.trained.len(), 1);

    let artifacts = store.load_all().unwrap();
    assert_eq!(artifacts["Alpha"].time_reference, reference);

    let server = ForecastServer::start(&store);
    for year in [2001, 2005, 2030] {
        assert_relative_eq!(
            server.predict("Alpha", year).unwrap().predicted_value,
            linear(year),
            epsilon = 1e-6
        );
    }
}

#[rstest]
#[case(ModelKind::LinearTrend)]
#[case(ModelKind::Drift)]
fn test_serving_matches_evaluation_forecast(#[case] kind: ModelKind) {
    let reference = TimeReference::new(2000);
    let record = |year: i32, target: f64| Record {
        partition: PartitionKey::new("Alpha"),
        year,
        relative_time: reference.to_relative(year),
        target,
        features: BTreeMap::new(),
    };
    // Curved series so the fitted model is not exact
    let train: Vec<Record> = [2000, 2001, 2002, 2003, 2004]
        .iter()
        .map(|&y| record(y, f64::from((y - 2000) * (y - 2000))))
        .collect();
    let test = vec![record(2005, 25.0)];

    let plan = PartitionSplitter::split(train, test);
    let trained = ForecastTrainer::new(kind)
        .train_partition(plan.get("Alpha").unwrap(), &reference)
        .unwrap();
    assert!(trained.evaluation.mae > 0.0);

    let store = InMemoryModelStore::new();
    store
        .save(&trained.artifact.canonical_key, &trained.artifact)
        .unwrap();
    let server = ForecastServer::start(&store);

    let served = server
        .predict("Alpha", reference.minimum_year() + 5)
        .unwrap();
    assert_relative_eq!(
        served.predicted_value,
        trained.test_predictions[0],
        epsilon = 1e-9
    );
}

#[test]
fn test_configured_time_reference_is_stored() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.time_reference = Some(1990);
    config.model.kind = ModelKind::Drift;
    write_alpha_beta(&config);

    pipeline::train(&config).unwrap();

    let artifacts = FsModelStore::new(&config.model.dir).load_all().unwrap();
    let alpha = &artifacts["Alpha"];
    assert_eq!(alpha.time_reference.minimum_year(), 1990);
    assert_eq!(alpha.model_kind(), ModelKind::Drift);
    assert_relative_eq!(alpha.predict_year(2010).unwrap(), linear(2010), epsilon = 1e-6);
}

#[test]
fn test_preprocess_then_train() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let mut raw = format!("{}\n", HEADER);
    for country in ["Norway", "Costa Rica"] {
        for year in 2000..2010 {
            raw.push_str(&format!("{},{},{}\n", country, year, linear(year)));
        }
    }
    raw.push_str("Norway,2010,\n");
    fs::write(&config.data.raw_path, raw).unwrap();

    let summary = pipeline::preprocess(&config).unwrap();
    assert_eq!(summary.filled_targets, 1);
    assert_eq!(summary.train_rows + summary.test_rows, 21);
    assert_eq!(summary.test_rows, 4);
    assert!(config.data.train_path.exists());
    assert!(config.data.test_path.exists());

    let report = pipeline::train(&config).unwrap();
    assert_eq!(
        report.trained.len() + report.skipped.len() + report.failed.len(),
        2
    );
}

#[test]
fn test_missing_target_column_aborts_training() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    fs::write(&config.data.train_path, "Country,Year\nAlpha,2000\n").unwrap();
    write_rows(&config.data.test_path, &[("Alpha", 2001)]);

    let err = pipeline::train(&config).unwrap_err();

    assert!(err.is_fatal());
    assert!(!config.model.dir.exists());
}

#[test]
fn test_retraining_stops_serving_emptied_partition() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    write_rows(
        &config.data.train_path,
        &[
            ("Alpha", 2000),
            ("Alpha", 2001),
            ("Alpha", 2004),
            ("Beta", 2000),
            ("Beta", 2001),
            ("Beta", 2004),
        ],
    );
    write_rows(&config.data.test_path, &[("Alpha", 2003), ("Beta", 2003)]);

    let first = pipeline::train(&config).unwrap();
    assert_eq!(first.trained.len(), 2);
    let server = ForecastServer::start(&FsModelStore::new(&config.model.dir));
    assert!(server.predict("Beta", 2003).is_ok());

    // Beta keeps test rows but loses every train row
    write_rows(
        &config.data.train_path,
        &[("Alpha", 2000), ("Alpha", 2001), ("Alpha", 2004)],
    );

    let second = pipeline::train(&config).unwrap();
    assert_eq!(second.trained.len(), 1);
    assert_eq!(second.skipped[0].key.as_str(), "Beta");

    let server = ForecastServer::start(&FsModelStore::new(&config.model.dir));
    assert!(server.predict("Alpha", 2003).is_ok());
    assert!(matches!(
        server.predict("Beta", 2003),
        Err(ServeError::NotFound { .. })
    ));
}
