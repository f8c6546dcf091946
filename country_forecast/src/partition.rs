//! Grouping of records into per-country train/test datasets

use crate::data::Record;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Canonical, human-provided partition identifier (e.g. a country name)
///
/// The key is kept verbatim, including spaces and case. Storage layers
/// encode it for file names but always persist this original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PartitionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for PartitionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Train and test records of one partition
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDataset {
    pub key: PartitionKey,
    pub train: Vec<Record>,
    pub test: Vec<Record>,
}

impl PartitionDataset {
    /// Relative times and targets of the train subset
    pub fn train_series(&self) -> (Vec<f64>, Vec<f64>) {
        series(&self.train)
    }

    /// Relative times and targets of the test subset
    pub fn test_series(&self) -> (Vec<f64>, Vec<f64>) {
        series(&self.test)
    }

    /// Number of distinct years in the train subset
    pub fn distinct_train_years(&self) -> usize {
        let mut years: Vec<i32> = self.train.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years.len()
    }
}

fn series(records: &[Record]) -> (Vec<f64>, Vec<f64>) {
    records
        .iter()
        .map(|r| (r.relative_time as f64, r.target))
        .unzip()
}

/// Why a partition was left out of training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyTrain,
    EmptyTest,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyTrain => write!(f, "no train rows"),
            SkipReason::EmptyTest => write!(f, "no test rows"),
        }
    }
}

/// A partition skipped because one of its subsets is empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPartition {
    pub key: PartitionKey,
    pub reason: SkipReason,
}

/// Output of the splitter: trainable partitions plus the skipped ones
#[derive(Debug, Clone, Default)]
pub struct PartitionPlan {
    datasets: BTreeMap<PartitionKey, PartitionDataset>,
    skipped: Vec<SkippedPartition>,
}

impl PartitionPlan {
    /// Partitions with non-empty train and test subsets
    pub fn datasets(&self) -> impl Iterator<Item = &PartitionDataset> {
        self.datasets.values()
    }

    /// Look up one partition
    pub fn get(&self, key: &str) -> Option<&PartitionDataset> {
        self.datasets.get(key)
    }

    pub fn skipped(&self) -> &[SkippedPartition] {
        &self.skipped
    }

    /// Number of trainable partitions
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Groups pre-split records by partition key
#[derive(Debug, Default)]
pub struct PartitionSplitter;

impl PartitionSplitter {
    /// Group train and test records by key, keeping the upstream split as is
    ///
    /// Every key seen in either split appears in the plan, either as a
    /// dataset or as a skipped partition.
    pub fn split(train: Vec<Record>, test: Vec<Record>) -> PartitionPlan {
        let mut groups: BTreeMap<PartitionKey, (Vec<Record>, Vec<Record>)> = BTreeMap::new();

        for record in train {
            groups
                .entry(record.partition.clone())
                .or_default()
                .0
                .push(record);
        }
        for record in test {
            groups
                .entry(record.partition.clone())
                .or_default()
                .1
                .push(record);
        }

        let mut plan = PartitionPlan::default();
        for (key, (train, test)) in groups {
            let reason = if train.is_empty() {
                Some(SkipReason::EmptyTrain)
            } else if test.is_empty() {
                Some(SkipReason::EmptyTest)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    warn!(partition = %key, %reason, "Skipping partition");
                    plan.skipped.push(SkippedPartition { key, reason });
                }
                None => {
                    plan.datasets
                        .insert(key.clone(), PartitionDataset { key, train, test });
                }
            }
        }

        plan
    }
}
