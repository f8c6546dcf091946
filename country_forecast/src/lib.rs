//! # Country Forecast
//!
//! Trains one forecaster per country from a tabular energy-consumption
//! dataset, persists each model and serves point forecasts.
//!
//! ## Pipeline
//!
//! - **Temporal features**: absolute years become relative time against a
//!   single reference year shared by every split and stored with each model
//! - **Partitioning**: records are grouped by country; countries without
//!   train or test rows are skipped and reported
//! - **Training**: one trend model per country, evaluated with MAE and R²
//! - **Registry**: one JSON artifact per country, keyed by the original name
//! - **Serving**: `predict(country, year)` against a read-only registry snapshot
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use country_forecast::config::PipelineConfig;
//! use country_forecast::registry::FsModelStore;
//! use country_forecast::server::ForecastServer;
//!
//! let config = PipelineConfig::from_yaml_file("config/config.yaml")?;
//! let report = country_forecast::pipeline::train(&config)?;
//! println!("{}", report);
//!
//! let server = ForecastServer::start(&FsModelStore::new(&config.model.dir));
//! match server.predict("Germany", 2030) {
//!     Ok(prediction) => println!("{:.2}", prediction.predicted_value),
//!     Err(e) => println!("{} ({})", e, e.status_code()),
//! }
//! # Ok::<(), country_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod split;
pub mod trainer;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::data::{DataLoader, EnergyTable, Record};
pub use crate::error::ForecastError;
pub use crate::features::TimeReference;
pub use crate::metrics::Evaluation;
pub use crate::models::{ForecastModel, Forecaster, ModelKind, TrainedForecastModel};
pub use crate::partition::{PartitionKey, PartitionPlan, PartitionSplitter};
pub use crate::registry::{ForecastArtifact, FsModelStore, ModelStore, Registry};
pub use crate::server::{ForecastServer, Prediction, ServeError, ServerState};
pub use crate::trainer::{ForecastTrainer, TrainingReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
