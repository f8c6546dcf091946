//! Seeded train/test splitting of raw records

use crate::config::ColumnConfig;
use crate::data::Record;
use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::Path;

/// Shuffle records with a fixed seed and split off a test share
///
/// The test size is `round(len * test_ratio)`, so the same seed and input
/// always give the same split.
pub fn random_split(
    records: &[Record],
    test_ratio: f64,
    seed: u64,
) -> Result<(Vec<Record>, Vec<Record>)> {
    if test_ratio <= 0.0 || test_ratio >= 1.0 {
        return Err(ForecastError::Validation(format!(
            "Test ratio must be between 0 and 1, got {}",
            test_ratio
        )));
    }

    let mut shuffled = records.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let test_size = (records.len() as f64 * test_ratio).round() as usize;
    let test = shuffled.split_off(records.len() - test_size);

    Ok((shuffled, test))
}

/// Write records as CSV with the configured column names
///
/// Feature columns are the union of all record features; absent values are
/// left empty. The relative time is not written, it is re-derived on load.
pub fn write_records_csv<P: AsRef<Path>>(
    path: P,
    records: &[Record],
    columns: &ColumnConfig,
) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let feature_names: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.features.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        columns.partition.as_str(),
        columns.time.as_str(),
        columns.target.as_str(),
    ];
    header.extend(feature_names.iter().copied());
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.partition.to_string(),
            record.year.to_string(),
            record.target.to_string(),
        ];
        row.extend(feature_names.iter().map(|name| {
            record
                .features
                .get(*name)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
