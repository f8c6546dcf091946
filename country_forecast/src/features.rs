//! Relative time derivation shared by training, evaluation and serving
//!
//! The reference minimum year is computed once from the canonical dataset
//! (train and test together), stored in every model artifact and read back
//! at serving time. Nothing downstream recomputes it.

use crate::data::EnergyTable;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the derived column holding `year - minimum_year`
pub const RELATIVE_TIME_COLUMN: &str = "relative_time";

/// Reference year that maps absolute years onto the forecaster's time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeReference {
    minimum_year: i32,
}

impl TimeReference {
    /// Use an explicit reference year
    pub fn new(minimum_year: i32) -> Self {
        Self { minimum_year }
    }

    /// Minimum over a set of years
    pub fn from_years<I: IntoIterator<Item = i32>>(years: I) -> Result<Self> {
        years
            .into_iter()
            .min()
            .map(Self::new)
            .ok_or_else(|| ForecastError::Data("Cannot derive a time reference from no years".to_string()))
    }

    /// Minimum year across all given tables
    ///
    /// Pass every split of the dataset so they share one reference.
    pub fn from_tables(tables: &[&EnergyTable]) -> Result<Self> {
        let mut years = Vec::new();
        for table in tables {
            years.extend(table.years()?.into_iter().flatten());
        }
        let reference = Self::from_years(years)?;
        debug!(minimum_year = reference.minimum_year, "Derived time reference");
        Ok(reference)
    }

    pub fn minimum_year(&self) -> i32 {
        self.minimum_year
    }

    /// Convert an absolute year to relative time
    pub fn to_relative(&self, year: i32) -> i64 {
        i64::from(year) - i64::from(self.minimum_year)
    }

    /// Convert relative time back to an absolute year
    pub fn to_absolute(&self, relative: i64) -> Result<i32> {
        let year = i64::from(self.minimum_year) + relative;
        i32::try_from(year).map_err(|_| {
            ForecastError::Data(format!("Relative time {} is out of the year range", relative))
        })
    }

    /// Calendar date (1 January) of a relative time
    pub fn to_date(&self, relative: i64) -> Result<NaiveDate> {
        let year = self.to_absolute(relative)?;
        NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| ForecastError::Data(format!("Year {} has no calendar date", year)))
    }
}

/// Append the relative time column to a table
///
/// Overwrites the column if it was derived before.
pub fn derive_relative_time(table: &mut EnergyTable, reference: &TimeReference) -> Result<()> {
    let years = table.years()?;
    let relative: Vec<Option<i64>> = years
        .into_iter()
        .map(|year| year.map(|y| reference.to_relative(y)))
        .collect();

    table
        .dataframe_mut()
        .with_column(Series::new(RELATIVE_TIME_COLUMN, relative))?;

    Ok(())
}
