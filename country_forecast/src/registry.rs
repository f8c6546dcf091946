//! Persistence of per-partition forecast artifacts
//!
//! Every artifact stores its canonical partition key and time reference
//! explicitly. File names are derived from the key for convenience only;
//! loading never reconstructs a key from a file name.

use crate::error::{ForecastError, Result};
use crate::features::TimeReference;
use crate::metrics::Evaluation;
use crate::models::{Forecaster, ModelKind, TrainedForecastModel};
use crate::partition::PartitionKey;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Version written into every artifact
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const ARTIFACT_SUFFIX: &str = ".forecast.json";

/// Fitted forecaster of one partition plus the metadata needed to serve it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub format_version: u32,
    pub canonical_key: PartitionKey,
    pub time_reference: TimeReference,
    pub forecaster: Forecaster,
    pub evaluation: Option<Evaluation>,
    pub trained_at: DateTime<Utc>,
}

impl ForecastArtifact {
    pub fn new(
        canonical_key: PartitionKey,
        time_reference: TimeReference,
        forecaster: Forecaster,
        evaluation: Option<Evaluation>,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            canonical_key,
            time_reference,
            forecaster,
            evaluation,
            trained_at: Utc::now(),
        }
    }

    pub fn model_kind(&self) -> ModelKind {
        self.forecaster.kind()
    }

    /// Point forecast for an absolute year, using the stored time reference
    pub fn predict_year(&self, year: i32) -> Result<f64> {
        let relative = self.time_reference.to_relative(year);
        self.forecaster.predict_at(relative as f64)
    }
}

/// File-safe, invertible encoding of a partition key
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (uppercase hex). Distinct keys always map to distinct storage keys.
pub fn storage_key(key: &PartitionKey) -> String {
    let mut encoded = String::with_capacity(key.as_str().len());
    for byte in key.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}

/// Inverse of [`storage_key`]
pub fn decode_storage_key(encoded: &str) -> Option<PartitionKey> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok().map(PartitionKey::from)
}

/// Keyed persistence for forecast artifacts
pub trait ModelStore: Send + Sync {
    /// Write or overwrite the artifact for `key`
    fn save(&self, key: &PartitionKey, artifact: &ForecastArtifact) -> Result<()>;

    /// Read every readable artifact, keyed by canonical partition key
    fn load_all(&self) -> Result<HashMap<PartitionKey, ForecastArtifact>>;

    /// Delete the artifact for `key`; returns whether one existed
    fn remove(&self, key: &PartitionKey) -> Result<bool>;
}

fn check_key(key: &PartitionKey, artifact: &ForecastArtifact) -> Result<()> {
    if &artifact.canonical_key != key {
        return Err(ForecastError::Persistence(format!(
            "Artifact for '{}' cannot be saved under key '{}'",
            artifact.canonical_key, key
        )));
    }
    Ok(())
}

/// Directory of JSON artifacts, one file per partition
#[derive(Debug, Clone)]
pub struct FsModelStore {
    dir: PathBuf,
}

impl FsModelStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact file for a key
    pub fn artifact_path(&self, key: &PartitionKey) -> PathBuf {
        self.dir
            .join(format!("{}{}", storage_key(key), ARTIFACT_SUFFIX))
    }

    fn read_artifact(path: &Path) -> Result<ForecastArtifact> {
        let bytes = fs::read(path)?;
        let artifact: ForecastArtifact = serde_json::from_slice(&bytes)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ForecastError::Persistence(format!(
                "Unsupported artifact format version {}",
                artifact.format_version
            )));
        }
        Ok(artifact)
    }
}

impl ModelStore for FsModelStore {
    fn save(&self, key: &PartitionKey, artifact: &ForecastArtifact) -> Result<()> {
        check_key(key, artifact)?;

        let persist_err = |e: std::io::Error| {
            ForecastError::Persistence(format!("Cannot save model for '{}': {}", key, e))
        };

        fs::create_dir_all(&self.dir).map_err(persist_err)?;

        let path = self.artifact_path(key);
        let tmp_path = self
            .dir
            .join(format!(".{}{}.tmp", storage_key(key), ARTIFACT_SUFFIX));
        let json = serde_json::to_vec_pretty(artifact)?;

        // Rename over the old file so readers never see a partial write.
        if let Err(e) = fs::write(&tmp_path, json).and_then(|_| fs::rename(&tmp_path, &path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(persist_err(e));
        }

        debug!(partition = %key, path = %path.display(), "Saved model artifact");
        Ok(())
    }

    fn load_all(&self) -> Result<HashMap<PartitionKey, ForecastArtifact>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(dir = %self.dir.display(), "Model directory does not exist");
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(ForecastError::Persistence(format!(
                    "Cannot read model directory {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(ARTIFACT_SUFFIX) && !n.starts_with('.'))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut artifacts = HashMap::new();
        for path in paths {
            match Self::read_artifact(&path) {
                Ok(artifact) => {
                    let key = artifact.canonical_key.clone();
                    if artifacts.insert(key.clone(), artifact).is_some() {
                        warn!(partition = %key, path = %path.display(), "Duplicate artifact, keeping the later file");
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable model artifact");
                }
            }
        }

        info!(count = artifacts.len(), dir = %self.dir.display(), "Loaded model artifacts");
        Ok(artifacts)
    }

    fn remove(&self, key: &PartitionKey) -> Result<bool> {
        let path = self.artifact_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(partition = %key, path = %path.display(), "Removed model artifact");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ForecastError::Persistence(format!(
                "Cannot remove model for '{}': {}",
                key, e
            ))),
        }
    }
}

/// Store kept in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    entries: Mutex<HashMap<PartitionKey, ForecastArtifact>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ModelStore for InMemoryModelStore {
    fn save(&self, key: &PartitionKey, artifact: &ForecastArtifact) -> Result<()> {
        check_key(key, artifact)?;
        self.entries.lock().insert(key.clone(), artifact.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<HashMap<PartitionKey, ForecastArtifact>> {
        Ok(self.entries.lock().clone())
    }

    fn remove(&self, key: &PartitionKey) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

/// Read-only mapping from canonical key to loaded artifact
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<PartitionKey, Arc<ForecastArtifact>>,
}

impl Registry {
    pub fn from_artifacts(artifacts: HashMap<PartitionKey, ForecastArtifact>) -> Self {
        Self {
            entries: artifacts
                .into_iter()
                .map(|(key, artifact)| (key, Arc::new(artifact)))
                .collect(),
        }
    }

    /// Load every artifact from a store
    pub fn load(store: &dyn ModelStore) -> Result<Self> {
        Ok(Self::from_artifacts(store.load_all()?))
    }

    pub fn get(&self, key: &str) -> Option<&Arc<ForecastArtifact>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
