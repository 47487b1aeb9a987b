//! Model artifact
//!
//! The fitted model, the ordered feature list it was trained on and its family
//! tag travel together as one value and are persisted as one bincode blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{check_width, Regressor, TemperatureModel};
use super::ModelFamily;
use crate::domain::ObservationTable;
use crate::error::ModelError;
use crate::forecast::metrics::HoldoutMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub artifact_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Rows the persisted model was fitted on.
    pub training_samples: usize,
    /// Holdout scores from evaluate-then-refit, when available.
    pub metrics: Option<HoldoutMetrics>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    model: TemperatureModel,
    features: Vec<String>,
    model_type: ModelFamily,
    metadata: ArtifactMetadata,
}

impl ModelArtifact {
    /// Bundle a fitted model with the feature names of its input columns.
    pub fn new(model: TemperatureModel, features: Vec<String>) -> Result<Self, ModelError> {
        if !model.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        if model.n_features() != features.len() {
            return Err(ModelError::WidthMismatch {
                expected: model.n_features(),
                actual: features.len(),
            });
        }

        let metadata = ArtifactMetadata {
            artifact_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            training_samples: model.fitted_rows(),
            metrics: None,
        };

        Ok(Self {
            model_type: model.family(),
            model,
            features,
            metadata,
        })
    }

    pub fn with_metrics(mut self, metrics: HoldoutMetrics) -> Self {
        self.metadata.metrics = Some(metrics);
        self
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn model_type(&self) -> ModelFamily {
        self.model_type
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn model(&self) -> &TemperatureModel {
        &self.model
    }

    /// Predict rows laid out in [`ModelArtifact::features`] order.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        check_width(rows, self.features.len())?;
        self.model.predict(rows)
    }

    /// Artifact features that are not columns of `table`, in artifact order.
    pub fn missing_features(&self, table: &ObservationTable) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| !table.has_column(f))
            .cloned()
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
