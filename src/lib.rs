//! Daily temperature forecasting for weather stations.
//!
//! Cleaned daily observations flow through temporal feature construction,
//! training-set assembly, tree-ensemble training, chronological holdout
//! evaluation (followed by a full-data refit) and an N-day forecast.

pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod pipeline;
pub mod store;
pub mod summary;
pub mod telemetry;
pub mod transform;

pub use error::{FeatureMismatchError, ForecastError, InputError, ModelError};
