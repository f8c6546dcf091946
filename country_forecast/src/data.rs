//! Tabular energy-consumption data handling

use crate::config::ColumnConfig;
use crate::error::{ForecastError, Result};
use crate::features::RELATIVE_TIME_COLUMN;
use crate::partition::PartitionKey;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// One observation of a partition at an absolute year
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Partition (country) the record belongs to
    pub partition: PartitionKey,
    /// Absolute year
    pub year: i32,
    /// Year relative to the shared reference minimum
    pub relative_time: i64,
    /// Target value
    pub target: f64,
    /// Additional numeric columns by name
    pub features: BTreeMap<String, f64>,
}

/// Energy table backed by a polars DataFrame
#[derive(Debug, Clone)]
pub struct EnergyTable {
    /// Data frame containing the raw or processed rows
    df: DataFrame,
    /// Names of the key, time and target columns
    columns: ColumnConfig,
}

/// Data loader for energy tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &ColumnConfig) -> Result<EnergyTable> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading CSV");
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        EnergyTable::new(df, columns.clone())
    }
}

impl EnergyTable {
    /// Create a table, checking that the key, time and target columns exist
    pub fn new(df: DataFrame, columns: ColumnConfig) -> Result<Self> {
        let present = df.get_column_names();
        let missing: Vec<&str> = [
            columns.partition.as_str(),
            columns.time.as_str(),
            columns.target.as_str(),
        ]
        .into_iter()
        .filter(|c| !present.contains(c))
        .collect();

        if !missing.is_empty() {
            return Err(ForecastError::Configuration(format!(
                "Missing required column(s) {:?}; found {:?}",
                missing, present
            )));
        }

        Ok(Self { df, columns })
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub(crate) fn dataframe_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }

    /// Get the column layout
    pub fn columns(&self) -> &ColumnConfig {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Whether the relative time column has been derived
    pub fn has_relative_time(&self) -> bool {
        self.df
            .get_column_names()
            .contains(&RELATIVE_TIME_COLUMN)
    }

    /// Absolute years, one entry per row (`None` for null cells)
    pub fn years(&self) -> Result<Vec<Option<i32>>> {
        let column = self.df.column(&self.columns.time).map_err(|_| {
            ForecastError::Configuration(format!(
                "Time column '{}' not found",
                self.columns.time
            ))
        })?;

        column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|value| value.map(year_from_i64).transpose())
            .collect()
    }

    /// Replace null target cells with the column mean
    ///
    /// Returns the number of cells filled.
    pub fn fill_missing_target_with_mean(&mut self) -> Result<usize> {
        let target = self.columns.target.clone();
        let column = self.df.column(&target)?.cast(&DataType::Float64)?;
        let missing = column.null_count();
        if missing == 0 {
            return Ok(0);
        }

        let mut filled = column.fill_null(FillNullStrategy::Mean)?;
        filled.rename(&target);
        self.df.replace(&target, filled)?;
        debug!(column = %target, missing, "Filled missing target values with mean");

        Ok(missing)
    }

    /// Convert rows into records
    ///
    /// Requires the relative time column (see
    /// [`derive_relative_time`](crate::features::derive_relative_time)).
    /// Rows with a null key, year, relative time or target are dropped.
    pub fn records(&self) -> Result<Vec<Record>> {
        if !self.has_relative_time() {
            return Err(ForecastError::Configuration(format!(
                "Column '{}' missing; derive relative time before extracting records",
                RELATIVE_TIME_COLUMN
            )));
        }

        let keys = self.string_column(&self.columns.partition)?;
        let years = self.years()?;
        let relative: Vec<Option<i64>> = self
            .df
            .column(RELATIVE_TIME_COLUMN)?
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect();
        let targets = self.column_as_f64(&self.columns.target)?;
        let features = self.feature_columns()?;

        let mut records = Vec::with_capacity(self.len());
        let mut dropped = 0usize;

        for row in 0..self.len() {
            match (&keys[row], years[row], relative[row], targets[row]) {
                (Some(key), Some(year), Some(relative_time), Some(target)) => {
                    let features = features
                        .iter()
                        .filter_map(|(name, values)| values[row].map(|v| (name.clone(), v)))
                        .collect();
                    records.push(Record {
                        partition: PartitionKey::new(key.as_str()),
                        year,
                        relative_time,
                        target,
                        features,
                    });
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped, "Dropped rows with missing key, year or target");
        }

        Ok(records)
    }

    /// Helper method to get a column as strings
    fn string_column(&self, column_name: &str) -> Result<Vec<Option<String>>> {
        let col = self.df.column(column_name).map_err(|e| {
            ForecastError::Configuration(format!("Column '{}' not found: {}", column_name, e))
        })?;

        Ok(col
            .cast(&DataType::Utf8)?
            .utf8()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect())
    }

    /// Helper method to get a column as f64 values
    fn column_as_f64(&self, column_name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.df.column(column_name).map_err(|e| {
            ForecastError::Configuration(format!("Column '{}' not found: {}", column_name, e))
        })?;

        if !col.dtype().is_numeric() {
            return Err(ForecastError::Data(format!(
                "Column '{}' cannot be converted to f64",
                column_name
            )));
        }

        Ok(col.cast(&DataType::Float64)?.f64()?.into_iter().collect())
    }

    /// Numeric columns other than key, time, target and relative time
    fn feature_columns(&self) -> Result<Vec<(String, Vec<Option<f64>>)>> {
        let reserved = [
            self.columns.partition.as_str(),
            self.columns.time.as_str(),
            self.columns.target.as_str(),
            RELATIVE_TIME_COLUMN,
        ];

        self.df
            .get_columns()
            .iter()
            .filter(|s| !reserved.contains(&s.name()) && s.dtype().is_numeric())
            .map(|s| {
                let values: Vec<Option<f64>> =
                    s.cast(&DataType::Float64)?.f64()?.into_iter().collect();
                Ok((s.name().to_string(), values))
            })
            .collect()
    }
}

fn year_from_i64(value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| ForecastError::Data(format!("Year {} is out of range", value)))
}
