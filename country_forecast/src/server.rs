//! Forecast serving over a loaded model registry
//!
//! The server holds an immutable snapshot of the registry behind a lock
//! that is only taken to clone or replace the snapshot pointer. Queries run
//! against their own snapshot, so a reload is observed all at once.

use crate::error::ForecastError;
use crate::partition::PartitionKey;
use crate::registry::{ModelStore, Registry};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Lifecycle of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Registry is being populated
    Loading,
    /// At least one model is loaded
    Ready,
    /// No models could be loaded; every query is answered with not found
    Degraded,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Loading => write!(f, "loading"),
            ServerState::Ready => write!(f, "ready"),
            ServerState::Degraded => write!(f, "degraded"),
        }
    }
}

/// Forecast request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub partition_key: PartitionKey,
    pub target_time: i32,
}

/// Successful point forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub partition_key: PartitionKey,
    pub target_time: i32,
    pub predicted_value: f64,
}

/// Failed forecast query
#[derive(Debug, Clone, PartialEq)]
pub enum ServeError {
    /// No model for the key: unknown partition or one that failed to train
    NotFound { partition_key: PartitionKey },
    /// The model could not produce a forecast; details are only logged
    Internal { correlation_id: Uuid },
}

impl ServeError {
    /// HTTP-equivalent status code
    pub fn status_code(&self) -> u16 {
        match self {
            ServeError::NotFound { .. } => 404,
            ServeError::Internal { .. } => 500,
        }
    }

    /// Body returned to the client
    pub fn body(&self) -> ErrorBody {
        match self {
            ServeError::NotFound { partition_key } => ErrorBody {
                error: "not_found".to_string(),
                message: format!("No model available for {}", partition_key),
                correlation_id: None,
            },
            ServeError::Internal { correlation_id } => ErrorBody {
                error: "internal_error".to_string(),
                message: "Forecast could not be computed".to_string(),
                correlation_id: Some(*correlation_id),
            },
        }
    }
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::NotFound { partition_key } => {
                write!(f, "no model available for {}", partition_key)
            }
            ServeError::Internal { correlation_id } => {
                write!(f, "internal error (correlation id {})", correlation_id)
            }
        }
    }
}

impl std::error::Error for ServeError {}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

/// Transport-neutral reply: status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ServeReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug)]
struct Snapshot {
    state: ServerState,
    registry: Arc<Registry>,
}

/// Answers point forecast queries from a registry snapshot
#[derive(Debug)]
pub struct ForecastServer {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Default for ForecastServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastServer {
    /// Create a server in the `Loading` state with no models
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot {
                state: ServerState::Loading,
                registry: Arc::new(Registry::default()),
            })),
        }
    }

    /// Create a server and load it from a store
    pub fn start(store: &dyn ModelStore) -> Self {
        let server = Self::new();
        server.load_from(store);
        server
    }

    /// Populate the registry from a store and leave `Loading`
    ///
    /// A store that is missing, unreadable or empty leaves the server
    /// `Degraded`.
    pub fn load_from(&self, store: &dyn ModelStore) -> ServerState {
        let registry = match Registry::load(store) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(error = %e, "Model store could not be read");
                Registry::default()
            }
        };
        self.install(registry)
    }

    /// Replace the whole registry with a freshly loaded one
    ///
    /// On a store error the current registry stays in place.
    pub fn reload(&self, store: &dyn ModelStore) -> Result<ServerState, ForecastError> {
        let registry = Registry::load(store)?;
        Ok(self.install(registry))
    }

    /// Swap in a registry built elsewhere
    pub fn install(&self, registry: Registry) -> ServerState {
        let state = if registry.is_empty() {
            ServerState::Degraded
        } else {
            ServerState::Ready
        };
        let models = registry.len();

        *self.snapshot.write() = Arc::new(Snapshot {
            state,
            registry: Arc::new(registry),
        });

        info!(%state, models, "Forecast registry installed");
        state
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn state(&self) -> ServerState {
        self.current().state
    }

    /// Registry currently being served
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.current().registry)
    }

    /// Point forecast for a partition at an absolute year
    pub fn predict(&self, partition_key: &str, target_time: i32) -> Result<Prediction, ServeError> {
        let snapshot = self.current();

        let artifact = snapshot
            .registry
            .get(partition_key)
            .ok_or_else(|| ServeError::NotFound {
                partition_key: PartitionKey::new(partition_key),
            })?;

        match artifact.predict_year(target_time) {
            Ok(predicted_value) => Ok(Prediction {
                partition_key: artifact.canonical_key.clone(),
                target_time,
                predicted_value,
            }),
            Err(e) => {
                let correlation_id = Uuid::new_v4();
                error!(
                    %correlation_id,
                    partition = %partition_key,
                    target_time,
                    error = %e,
                    "Forecast failed"
                );
                Err(ServeError::Internal { correlation_id })
            }
        }
    }

    /// Answer a JSON request body `{"partition_key": ..., "target_time": ...}`
    pub fn handle_predict_json(&self, body: &str) -> ServeReply {
        let request: PredictRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(e) => {
                let body = ErrorBody {
                    error: "invalid_request".to_string(),
                    message: e.to_string(),
                    correlation_id: None,
                };
                return reply(400, &body);
            }
        };

        match self.predict(request.partition_key.as_str(), request.target_time) {
            Ok(prediction) => reply(200, &prediction),
            Err(e) => reply(e.status_code(), &e.body()),
        }
    }
}

fn reply<T: Serialize>(status: u16, body: &T) -> ServeReply {
    match serde_json::to_string(body) {
        Ok(body) => ServeReply { status, body },
        Err(e) => {
            let correlation_id = Uuid::new_v4();
            error!(%correlation_id, error = %e, "Cannot encode response");
            ServeReply {
                status: 500,
                body: format!(
                    "{{\"error\":\"internal_error\",\"message\":\"Response could not be encoded\",\"correlation_id\":\"{}\"}}",
                    correlation_id
                ),
            }
        }
    }
}
