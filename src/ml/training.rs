//! ML Model Training Pipeline
//!
//! Builds a model of the configured family with fixed hyperparameters and
//! fits it on a training dataset.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::gradient_boosting::{GradientBoostedTrees, GradientBoostingParams};
use super::models::{check_training_input, Regressor, TemperatureModel};
use super::smartcore::{RandomForestParams, SmartcoreRandomForest};
use super::ModelFamily;
use crate::error::{InputError, ModelError};

/// Training Dataset: feature matrix in date order, targets, and column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl TrainingDataset {
    pub fn new(
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
        feature_names: Vec<String>,
    ) -> Result<Self, ModelError> {
        let width = check_training_input(&features, &targets)?;
        if width != feature_names.len() {
            return Err(ModelError::WidthMismatch {
                expected: feature_names.len(),
                actual: width,
            });
        }
        Ok(Self {
            features,
            targets,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Split by row order into the first `train_ratio` share and the rest.
    /// No shuffling: rows must already be in date order.
    pub fn split(&self, train_ratio: f64) -> Result<(TrainingDataset, TrainingDataset), InputError> {
        let split_idx = (self.len() as f64 * train_ratio).floor() as usize;
        if split_idx == 0 || split_idx >= self.len() {
            return Err(InputError::InsufficientRows { rows: self.len() });
        }

        let train = TrainingDataset {
            features: self.features[..split_idx].to_vec(),
            targets: self.targets[..split_idx].to_vec(),
            feature_names: self.feature_names.clone(),
        };

        let test = TrainingDataset {
            features: self.features[split_idx..].to_vec(),
            targets: self.targets[split_idx..].to_vec(),
            feature_names: self.feature_names.clone(),
        };

        Ok((train, test))
    }
}

/// Training Configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub family: ModelFamily,
    pub gradient_boosting: GradientBoostingParams,
    pub random_forest: RandomForestParams,
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn family(&self) -> ModelFamily {
        self.config.family
    }

    /// An unfitted model of the configured family.
    pub fn build_model(&self) -> TemperatureModel {
        match self.config.family {
            ModelFamily::GradientBoosting => TemperatureModel::GradientBoosting(
                GradientBoostedTrees::new(self.config.gradient_boosting),
            ),
            ModelFamily::RandomForest => {
                TemperatureModel::RandomForest(SmartcoreRandomForest::new(self.config.random_forest))
            }
        }
    }

    /// Fit a fresh model on the whole dataset.
    pub fn train(&self, dataset: &TrainingDataset) -> Result<TemperatureModel, ModelError> {
        if dataset.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        let mut model = self.build_model();
        model.fit(&dataset.features, &dataset.targets)?;

        info!(
            family = %self.config.family,
            rows = dataset.len(),
            features = dataset.feature_names.len(),
            "model trained"
        );
        Ok(model)
    }
}
