//! Regression model abstraction
//!
//! Every backend fits on row-major `Vec<Vec<f64>>` matrices and predicts a
//! whole batch at once.

use serde::{Deserialize, Serialize};

use super::gradient_boosting::GradientBoostedTrees;
use super::smartcore::SmartcoreRandomForest;
use super::ModelFamily;
use crate::error::ModelError;

/// Trait for regression models
pub trait Regressor: Send + Sync {
    /// Fit from scratch; any previous fit is discarded.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;

    /// Predict one value per row, in row order.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    fn family(&self) -> ModelFamily;

    /// Rows used by the most recent fit (0 when unfitted).
    fn fitted_rows(&self) -> usize;

    /// Feature width seen by the most recent fit (0 when unfitted).
    fn n_features(&self) -> usize;

    fn is_fitted(&self) -> bool {
        self.fitted_rows() > 0
    }
}

/// Validate a training matrix and return its width.
pub(crate) fn check_training_input(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() || y.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    if x.len() != y.len() {
        return Err(ModelError::TargetMismatch {
            rows: x.len(),
            targets: y.len(),
        });
    }
    let width = x[0].len();
    check_width(x, width)?;
    Ok(width)
}

/// Every row must have `expected` columns.
pub(crate) fn check_width(x: &[Vec<f64>], expected: usize) -> Result<(), ModelError> {
    match x.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ModelError::WidthMismatch {
            expected,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

/// Concrete model held by an artifact.
#[derive(Debug, Serialize, Deserialize)]
pub enum TemperatureModel {
    GradientBoosting(GradientBoostedTrees),
    RandomForest(SmartcoreRandomForest),
}

impl Regressor for TemperatureModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        match self {
            Self::GradientBoosting(m) => m.fit(x, y),
            Self::RandomForest(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        match self {
            Self::GradientBoosting(m) => m.predict(x),
            Self::RandomForest(m) => m.predict(x),
        }
    }

    fn family(&self) -> ModelFamily {
        match self {
            Self::GradientBoosting(m) => m.family(),
            Self::RandomForest(m) => m.family(),
        }
    }

    fn fitted_rows(&self) -> usize {
        match self {
            Self::GradientBoosting(m) => m.fitted_rows(),
            Self::RandomForest(m) => m.fitted_rows(),
        }
    }

    fn n_features(&self) -> usize {
        match self {
            Self::GradientBoosting(m) => m.n_features(),
            Self::RandomForest(m) => m.n_features(),
        }
    }
}
