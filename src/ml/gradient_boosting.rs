//! Gradient-boosted regression trees
//!
//! XGBoost-style boosting on squared error: start from the target mean, then
//! each round fits a [`RegressionTree`] to the current residuals on a seeded
//! row/column subsample and adds it with shrinkage `learning_rate`.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{check_training_input, check_width, Regressor};
use super::tree::{RegressionTree, TreeParams};
use super::ModelFamily;
use crate::error::ModelError;

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Row subsample ratio per tree
    pub subsample: f64,
    /// Column subsample ratio per tree
    pub colsample_bytree: f64,
    pub min_samples_leaf: usize,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 6,
            learning_rate: 0.05,
            subsample: 0.8,
            colsample_bytree: 0.8,
            min_samples_leaf: 1,
            reg_lambda: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub params: GradientBoostingParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    fitted_rows: usize,
}

impl GradientBoostedTrees {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
            fitted_rows: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Initial prediction (mean of the training targets).
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let lr = self.params.learning_rate;
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + lr * tree.predict_row(row))
    }
}

/// Sorted sample of `ceil(n * ratio)` distinct indices, at least one.
fn sample_indices(rng: &mut StdRng, n: usize, ratio: f64) -> Vec<usize> {
    let amount = ((n as f64) * ratio.clamp(0.0, 1.0)).ceil() as usize;
    let amount = amount.clamp(1, n);
    if amount == n {
        return (0..n).collect();
    }
    let mut picked = index::sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}

impl Regressor for GradientBoostedTrees {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let n_features = check_training_input(x, y)?;
        if n_features == 0 {
            return Err(ModelError::WidthMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let n_samples = x.len();

        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            reg_lambda: self.params.reg_lambda,
        };
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        self.base_score = y.iter().sum::<f64>() / n_samples as f64;
        self.trees = Vec::with_capacity(self.params.n_estimators);

        let mut predictions = vec![self.base_score; n_samples];
        let mut residuals = vec![0.0; n_samples];

        for _ in 0..self.params.n_estimators {
            for i in 0..n_samples {
                residuals[i] = y[i] - predictions[i];
            }

            let rows = sample_indices(&mut rng, n_samples, self.params.subsample);
            let cols = sample_indices(&mut rng, n_features, self.params.colsample_bytree);
            let tree = RegressionTree::fit(x, &residuals, &rows, &cols, &tree_params);

            for (pred, row) in predictions.iter_mut().zip(x) {
                *pred += self.params.learning_rate * tree.predict_row(row);
            }
            self.trees.push(tree);
        }

        self.n_features = n_features;
        self.fitted_rows = n_samples;

        debug!(
            rows = n_samples,
            features = n_features,
            trees = self.trees.len(),
            "gradient boosting fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        check_width(x, self.n_features)?;
        Ok(x.iter().map(|row| self.predict_row(row)).collect())
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::GradientBoosting
    }

    fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2x1 + 3x2
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![(i % 7) as f64, (i % 5) as f64])
            .collect();
        let y = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_default_hyperparameters() {
        let params = GradientBoostingParams::default();
        assert_eq!(params.n_estimators, 300);
        assert_eq!(params.max_depth, 6);
        assert_eq!(params.learning_rate, 0.05);
        assert_eq!(params.subsample, 0.8);
        assert_eq!(params.colsample_bytree, 0.8);
        assert_eq!(params.seed, 42);
    }

    #[test]
    fn test_fit_reduces_training_error() {
        let (x, y) = linear_data(60);
        let mut model = GradientBoostedTrees::new(GradientBoostingParams::default());
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 300);
        assert_eq!(model.fitted_rows(), 60);

        let preds = model.predict(&x).unwrap();
        let mae: f64 = preds.iter().zip(&y).map(|(p, t)| (p - t).abs()).sum::<f64>() / y.len() as f64;
        assert!(mae < 0.5, "training MAE too high: {mae}");
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = linear_data(40);
        let mut a = GradientBoostedTrees::new(GradientBoostingParams::default());
        let mut b = GradientBoostedTrees::new(GradientBoostingParams::default());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_refit_replaces_previous_fit() {
        let (x, y) = linear_data(40);
        let mut model = GradientBoostedTrees::new(GradientBoostingParams {
            n_estimators: 20,
            ..Default::default()
        });
        model.fit(&x[..30], &y[..30]).unwrap();
        let partial_base = model.base_score();

        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 20);
        assert_eq!(model.fitted_rows(), 40);
        assert_ne!(model.base_score(), partial_base);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = GradientBoostedTrees::new(GradientBoostingParams::default());
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_predict_width_checked() {
        let (x, y) = linear_data(20);
        let mut model = GradientBoostedTrees::new(GradientBoostingParams {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0, 2.0, 3.0]]),
            Err(ModelError::WidthMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_sample_indices() {
        let mut rng = StdRng::seed_from_u64(7);
        let picked = sample_indices(&mut rng, 10, 0.8);
        assert_eq!(picked.len(), 8);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(sample_indices(&mut rng, 3, 1.0), vec![0, 1, 2]);
        assert_eq!(sample_indices(&mut rng, 5, 0.0).len(), 1);
    }
}
