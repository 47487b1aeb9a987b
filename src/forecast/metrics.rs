//! Forecast Metrics and Evaluation
//!
//! Error statistics for scoring a model on a held-out slice, plus the
//! two-decimal `{"MAE", "RMSE"}` record persisted next to each forecast.

use serde::{Deserialize, Serialize};

use crate::domain::round2;

/// Forecast accuracy metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Number of samples evaluated
    pub sample_count: usize,
    /// Maximum absolute error observed
    pub max_error: f64,
    /// Mean signed error (actual - predicted)
    pub bias: f64,
}

impl ForecastMetrics {
    /// Calculate metrics from actual and predicted values
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        if actual.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let rmse = mse.sqrt();

        let mean_actual = actual.iter().sum::<f64>() / n;
        let total_variance: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let residual_variance: f64 = errors.iter().map(|e| e * e).sum();

        let r2 = if total_variance > 1e-10 {
            1.0 - (residual_variance / total_variance)
        } else {
            0.0
        };

        let max_error = errors.iter().map(|e| e.abs()).fold(0.0f64, f64::max);
        let bias = errors.iter().sum::<f64>() / n;

        Ok(ForecastMetrics {
            mae,
            rmse,
            r2,
            sample_count: actual.len(),
            max_error,
            bias,
        })
    }

    /// The persisted two-decimal summary.
    pub fn holdout(&self) -> HoldoutMetrics {
        HoldoutMetrics {
            mae: round2(self.mae),
            rmse: round2(self.rmse),
        }
    }
}

/// Holdout scores rounded to two decimals. Provenance only; nothing is gated on them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutMetrics {
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
}

/// Forecast metrics calculation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_calculation() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        let predicted = vec![1.5, 2.0, 2.0, 4.0];

        let metrics = ForecastMetrics::calculate(&actual, &predicted).unwrap();

        assert!((metrics.mae - 0.375).abs() < 1e-12);
        assert!((metrics.rmse - (1.25f64 / 4.0).sqrt()).abs() < 1e-12);
        assert_eq!(metrics.max_error, 1.0);
        assert!((metrics.bias - 0.125).abs() < 1e-12);
        assert_eq!(metrics.sample_count, 4);
        assert!(metrics.r2 > 0.5);
    }

    #[test]
    fn test_perfect_forecast() {
        let values = vec![10.0, 12.0, 14.0];
        let metrics = ForecastMetrics::calculate(&values, &values).unwrap();

        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = ForecastMetrics::calculate(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            ForecastMetricsError::DimensionMismatch {
                actual: 2,
                predicted: 1
            }
        );
    }

    #[test]
    fn test_empty_data() {
        let err = ForecastMetrics::calculate(&[], &[]).unwrap_err();
        assert_eq!(err, ForecastMetricsError::EmptyData);
    }

    #[test]
    fn test_holdout_rounding_and_json_keys() {
        let metrics = ForecastMetrics::calculate(&[1.0, 2.0, 3.0], &[1.111, 2.0, 3.0]).unwrap();
        let holdout = metrics.holdout();

        assert_eq!(holdout.mae, 0.04);
        assert_eq!(holdout.rmse, 0.06);

        let json = serde_json::to_value(holdout).unwrap();
        assert_eq!(json, serde_json::json!({"MAE": 0.04, "RMSE": 0.06}));
    }
}
