//! Forecasting Module
//!
//! Feature engineering, training-set assembly, holdout metrics and the
//! day-ahead temperature forecaster.

pub mod dataset;
pub mod engine;
pub mod features;
pub mod metrics;

pub use dataset::{TrainingSetAssembler, BASE_FEATURES};
pub use engine::{ForecastConfig, ForecastStrategy, Forecaster};
pub use features::{TemporalFeature, TemporalFeatureBuilder};
pub use metrics::{ForecastMetrics, ForecastMetricsError, HoldoutMetrics};
