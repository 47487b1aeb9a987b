//! SmartCore RandomForest Model Wrapper
//!
//! Fallback model family. Wraps SmartCore's `RandomForestRegressor` behind
//! the [`Regressor`] trait with fixed, seeded parameters.

use serde::{Deserialize, Serialize};
use tracing::debug;

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::models::{check_training_input, check_width, Regressor};
use super::ModelFamily;
use crate::error::ModelError;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 12,
            min_samples_leaf: 1,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl RandomForestParams {
    /// SmartCore parameters; every split considers all `n_features` columns.
    pub fn to_smartcore(&self, n_features: usize) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(self.max_depth),
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
            n_trees: self.n_trees,
            m: Some(n_features),
            keep_samples: false, // Don't store training samples (saves memory)
            seed: self.seed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SmartcoreRandomForest {
    pub params: RandomForestParams,
    model: Option<Forest>,
    n_features: usize,
    fitted_rows: usize,
}

impl SmartcoreRandomForest {
    pub fn new(params: RandomForestParams) -> Self {
        Self {
            params,
            model: None,
            n_features: 0,
            fitted_rows: 0,
        }
    }
}

/// Row-major `Vec<Vec<f64>>` into a SmartCore matrix.
fn to_dense(x: &[Vec<f64>], n_features: usize) -> DenseMatrix<f64> {
    let mut flat_data = Vec::with_capacity(x.len() * n_features);
    for row in x {
        flat_data.extend_from_slice(row);
    }
    DenseMatrix::new(x.len(), n_features, flat_data, false)
}

impl Regressor for SmartcoreRandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let n_features = check_training_input(x, y)?;

        let x_matrix = to_dense(x, n_features);
        let y_vec = y.to_vec();

        let model = RandomForestRegressor::fit(&x_matrix, &y_vec, self.params.to_smartcore(n_features))
            .map_err(|e| ModelError::Backend(format!("RandomForest training failed: {:?}", e)))?;

        self.model = Some(model);
        self.n_features = n_features;
        self.fitted_rows = x.len();

        debug!(
            rows = x.len(),
            features = n_features,
            trees = self.params.n_trees,
            "random forest fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let model = self.model.as_ref().ok_or(ModelError::NotFitted)?;
        check_width(x, self.n_features)?;
        if x.is_empty() {
            return Ok(Vec::new());
        }

        model
            .predict(&to_dense(x, self.n_features))
            .map_err(|e| ModelError::Backend(format!("Prediction failed: {:?}", e)))
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForest
    }

    fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
