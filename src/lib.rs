//! # Energy Forecast
//!
//! Workspace facade over the forecasting crates.
//!
//! - [`forecast_math`]: trend fitting and accuracy metrics
//! - [`country_forecast`]: per-country training, model registry and serving
//!
//! ## Example
//!
//! ```
//! use energy_forecast_workspace::country_forecast::TimeReference;
//!
//! let reference = TimeReference::new(2000);
//! assert_eq!(reference.to_relative(2005), 5);
//! assert_eq!(reference.to_absolute(5).unwrap(), 2005);
//! ```

pub use country_forecast;
pub use forecast_math;

/// Version of the workspace facade
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
