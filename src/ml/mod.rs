//! Machine Learning Module
//!
//! Regression models for daily mean temperature:
//! - Gradient-boosted regression trees (primary family)
//! - SmartCore random forest (fallback family)
//!
//! # Architecture
//! - [`training::ModelTrainer`] builds and fits a model of the configured family
//! - [`evaluation::HoldoutEvaluator`] scores on a chronological holdout, then refits on all rows
//! - [`artifact::ModelArtifact`] bundles the fitted model with its ordered feature list

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod artifact;
pub mod evaluation;
pub mod gradient_boosting;
pub mod models;
pub mod smartcore;
pub mod training;
pub mod tree;

pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use models::{Regressor, TemperatureModel};

/// Algorithm family. Resolved once at start-up and passed to the trainer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    #[serde(rename = "xgboost")]
    GradientBoosting,
    #[serde(rename = "random_forest")]
    RandomForest,
}

impl ModelFamily {
    /// Pick the family for this run. Unset means the primary family; the
    /// random forest is used only when configured.
    pub fn resolve(preferred: Option<ModelFamily>) -> Self {
        match preferred {
            Some(family) => family,
            None => {
                let family = ModelFamily::default();
                info!(%family, "no model family configured, using the primary family");
                family
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::GradientBoosting => "xgboost",
            ModelFamily::RandomForest => "random_forest",
        }
    }
}

impl Default for ModelFamily {
    fn default() -> Self {
        ModelFamily::GradientBoosting
    }
}

impl std::str::FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xgboost" | "gradient_boosting" => Ok(ModelFamily::GradientBoosting),
            "random_forest" | "rf" => Ok(ModelFamily::RandomForest),
            _ => Err(format!("Unknown model family: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
