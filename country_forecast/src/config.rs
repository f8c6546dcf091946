//! Pipeline configuration loaded from YAML

use crate::error::{ForecastError, Result};
use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Column layout of the input tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Categorical partition key column
    pub partition: String,
    /// Absolute time column (integer year)
    pub time: String,
    /// Numeric target column
    pub target: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            partition: "Country".to_string(),
            time: "Year".to_string(),
            target: "Renewable Energy Share (%)".to_string(),
        }
    }
}

/// Input file locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/global_energy_consumption.csv"),
            train_path: PathBuf::from("data/processed/train.csv"),
            test_path: PathBuf::from("data/processed/test.csv"),
        }
    }
}

/// Forecaster selection and artifact location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            dir: PathBuf::from("models"),
        }
    }
}

/// Train/test split parameters used by preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub columns: ColumnConfig,
    pub model: ModelConfig,
    pub split: SplitConfig,
    pub evaluation_path: PathBuf,
    /// Fixed reference year; computed from the train and test tables when absent
    pub time_reference: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            columns: ColumnConfig::default(),
            model: ModelConfig::default(),
            split: SplitConfig::default(),
            evaluation_path: PathBuf::from("models/evaluation.json"),
            time_reference: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ForecastError::Configuration(format!(
                "Cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        let columns = [
            &self.columns.partition,
            &self.columns.time,
            &self.columns.target,
        ];
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(ForecastError::Configuration(
                "Column names must not be empty".to_string(),
            ));
        }
        if self.split.test_ratio <= 0.0 || self.split.test_ratio >= 1.0 {
            return Err(ForecastError::Configuration(format!(
                "split.test_ratio must be between 0 and 1, got {}",
                self.split.test_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = PipelineConfig::from_yaml_str("columns:\n  target: Demand\n").unwrap();
        assert_eq!(config.columns.target, "Demand");
        assert_eq!(config.columns.partition, "Country");
        assert_eq!(config.model.kind, ModelKind::LinearTrend);
        assert_eq!(config.split.seed, 42);
        assert!(config.time_reference.is_none());
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let err = PipelineConfig::from_yaml_str("split:\n  test_ratio: 1.5\n").unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }
}
