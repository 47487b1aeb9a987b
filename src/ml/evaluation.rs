//! Holdout evaluation
//!
//! Fit on the chronologically first share of the rows, score the rest, then
//! refit the same model on every row so the caller keeps the full-data fit.

use tracing::info;

use super::models::Regressor;
use super::training::TrainingDataset;
use crate::error::EvaluationError;
use crate::forecast::metrics::{ForecastMetrics, HoldoutMetrics};

/// Outcome of [`HoldoutEvaluator::evaluate_then_refit`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Scores of the holdout-only fit, rounded to 2 dp.
    pub metrics: HoldoutMetrics,
    /// Unrounded scores of the holdout-only fit.
    pub detail: ForecastMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct HoldoutEvaluator {
    pub train_fraction: f64,
}

impl Default for HoldoutEvaluator {
    fn default() -> Self {
        Self {
            train_fraction: 0.75,
        }
    }
}

impl HoldoutEvaluator {
    pub fn new(train_fraction: f64) -> Self {
        Self { train_fraction }
    }

    /// Score `model` out of sample, then leave it fitted on all of `dataset`.
    ///
    /// The returned metrics describe the fit on the training share only; the
    /// model handed back has the same hyperparameters but more data.
    pub fn evaluate_then_refit<M: Regressor + ?Sized>(
        &self,
        model: &mut M,
        dataset: &TrainingDataset,
    ) -> Result<Evaluation, EvaluationError> {
        let (train, test) = dataset.split(self.train_fraction)?;

        model.fit(&train.features, &train.targets)?;
        let predicted = model.predict(&test.features)?;
        let detail = ForecastMetrics::calculate(&test.targets, &predicted)?;
        let metrics = detail.holdout();

        info!(
            train_rows = train.len(),
            test_rows = test.len(),
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = detail.r2,
            max_error = detail.max_error,
            bias = detail.bias,
            "holdout evaluation"
        );

        model.fit(&dataset.features, &dataset.targets)?;

        Ok(Evaluation {
            metrics,
            detail,
            train_rows: train.len(),
            test_rows: test.len(),
        })
    }
}
