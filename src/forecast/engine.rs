//! Forecaster
//!
//! Projects a fitted [`ModelArtifact`] forward `days_ahead` days from the most
//! recent observations. Future covariates are unknown, so each future row is
//! synthesised from the trailing-window mean of the history plus seeded
//! Gaussian noise.
//!
//! Two strategies:
//! - [`ForecastStrategy::Strict`] (default): every artifact feature must be a
//!   history column; one batch prediction.
//! - [`ForecastStrategy::Recursive`]: lag / rolling / calendar features are
//!   regenerated day by day from the extended series, feeding each prediction
//!   back as the next day's `temp_avg` history.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features::{window_mean, TemporalFeature};
use crate::domain::columns::TEMP_AVG;
use crate::domain::{round2, ForecastPoint, ForecastTable, ObservationTable};
use crate::error::{FeatureMismatchError, ForecastError, InputError, ModelError};
use crate::ml::ModelArtifact;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStrategy {
    /// Refuse artifacts whose features are not history columns.
    #[default]
    Strict,
    /// Regenerate temporal features from previously forecast values.
    Recursive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub days_ahead: usize,
    /// Trailing rows averaged into the baseline (capped at the history length).
    pub baseline_window: usize,
    /// Standard deviation of the additive noise, in feature units.
    pub noise_std: f64,
    /// Fixed seed for reproducible noise; fresh entropy when absent.
    pub seed: Option<u64>,
    pub strategy: ForecastStrategy,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            days_ahead: 3,
            baseline_window: 5,
            noise_std: 0.05,
            seed: None,
            strategy: ForecastStrategy::Strict,
        }
    }
}

/// How one artifact feature is filled in a synthesised row.
enum Slot {
    /// Index into the synthesised contemporaneous values.
    Synthesized(usize),
    Temporal(TemporalFeature),
}

pub struct Forecaster {
    config: ForecastConfig,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn forecast(
        &self,
        artifact: &ModelArtifact,
        history: &ObservationTable,
    ) -> Result<ForecastTable, ForecastError> {
        let table = match self.config.strategy {
            ForecastStrategy::Strict => self.forecast_strict(artifact, history)?,
            ForecastStrategy::Recursive => self.forecast_recursive(artifact, history)?,
        };
        debug!(
            strategy = ?self.config.strategy,
            days = table.len(),
            "forecast produced"
        );
        Ok(table)
    }

    fn forecast_strict(
        &self,
        artifact: &ModelArtifact,
        history: &ObservationTable,
    ) -> Result<ForecastTable, ForecastError> {
        let missing = artifact.missing_features(history);
        if !missing.is_empty() {
            return Err(FeatureMismatchError { missing }.into());
        }
        if history.is_empty() {
            return Err(InputError::EmptyTable.into());
        }
        if self.config.days_ahead == 0 {
            return Ok(ForecastTable::default());
        }

        let history = history.sorted_by_date();
        let recent = history.tail(self.config.baseline_window.max(1));
        let baseline = baselines(&recent, artifact.features())?;
        let (mut rng, noise) = self.noise()?;

        let rows: Vec<Vec<f64>> = (0..self.config.days_ahead)
            .map(|_| baseline.iter().map(|b| b + noise.sample(&mut rng)).collect())
            .collect();
        let predictions = artifact.predict(&rows)?;

        let last = history.max_date().ok_or(InputError::EmptyTable)?;
        Ok(forecast_table(last, predictions))
    }

    fn forecast_recursive(
        &self,
        artifact: &ModelArtifact,
        history: &ObservationTable,
    ) -> Result<ForecastTable, ForecastError> {
        let mut slots = Vec::with_capacity(artifact.features().len());
        let mut synthesized: Vec<String> = Vec::new();
        let mut missing = Vec::new();

        for name in artifact.features() {
            match TemporalFeature::parse(name) {
                Some(feature)
                    if feature
                        .source_column()
                        .map_or(true, |c| history.has_column(c)) =>
                {
                    slots.push(Slot::Temporal(feature));
                }
                _ if history.has_column(name) => {
                    slots.push(Slot::Synthesized(synthesized.len()));
                    synthesized.push(name.clone());
                }
                _ => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(FeatureMismatchError { missing }.into());
        }
        if history.is_empty() {
            return Err(InputError::EmptyTable.into());
        }

        let required = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Temporal(feature) => Some(feature.required_history()),
                Slot::Synthesized(_) => None,
            })
            .max()
            .unwrap_or(0)
            .max(1);
        if history.len() < required {
            return Err(InputError::InsufficientHistory {
                required,
                available: history.len(),
            }
            .into());
        }
        if self.config.days_ahead == 0 {
            return Ok(ForecastTable::default());
        }

        let history = history.sorted_by_date();
        let recent = history.tail(self.config.baseline_window.max(1));
        let baseline = baselines(&recent, &synthesized)?;
        let (mut rng, noise) = self.noise()?;

        // Series backing the lag / rolling features, extended one row per step.
        let mut sources: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for slot in &slots {
            if let Slot::Temporal(feature) = slot {
                if let Some(column) = feature.source_column() {
                    let values = history
                        .column(column)
                        .ok_or_else(|| InputError::MissingColumn(column.to_string()))?;
                    sources.insert(column.to_string(), values.to_vec());
                }
            }
        }
        let mut held: BTreeMap<String, f64> = BTreeMap::new();
        for column in sources.keys() {
            if column != TEMP_AVG && !synthesized.contains(column) {
                held.insert(column.clone(), trailing_mean(&recent, column)?);
            }
        }

        let last = history.max_date().ok_or(InputError::EmptyTable)?;
        let mut predictions = Vec::with_capacity(self.config.days_ahead);

        for step in 0..self.config.days_ahead {
            let date = last + Duration::days(step as i64 + 1);
            let current: Vec<f64> = baseline
                .iter()
                .map(|b| b + noise.sample(&mut rng))
                .collect();

            for (column, series) in sources.iter_mut() {
                let provisional = if column == TEMP_AVG {
                    series.last().copied().flatten()
                } else if let Some(i) = synthesized.iter().position(|s| s == column) {
                    Some(current[i])
                } else {
                    held.get(column).copied()
                };
                series.push(provisional);
            }

            let row = slots
                .iter()
                .map(|slot| match slot {
                    Slot::Synthesized(i) => Ok(current[*i]),
                    Slot::Temporal(feature) => temporal_value(feature, &sources, date),
                })
                .collect::<Result<Vec<f64>, InputError>>()?;

            let prediction = artifact
                .predict(&[row])?
                .into_iter()
                .next()
                .ok_or_else(|| ModelError::Backend("model returned no prediction".to_string()))?;

            if let Some(slot) = sources.get_mut(TEMP_AVG).and_then(|s| s.last_mut()) {
                *slot = Some(prediction);
            }
            predictions.push(prediction);
        }

        Ok(forecast_table(last, predictions))
    }

    fn noise(&self) -> Result<(StdRng, Normal<f64>), ForecastError> {
        let normal = Normal::new(0.0, self.config.noise_std)
            .map_err(|_| ForecastError::InvalidNoise(self.config.noise_std))?;
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok((rng, normal))
    }
}

/// Value of a temporal feature at the newest row of the extended series.
fn temporal_value(
    feature: &TemporalFeature,
    sources: &BTreeMap<String, Vec<Option<f64>>>,
    date: NaiveDate,
) -> Result<f64, InputError> {
    let undefined = || InputError::UndefinedBaseline(feature.name());
    let series = |column: &str| {
        sources
            .get(column)
            .ok_or_else(|| InputError::MissingColumn(column.to_string()))
    };

    match feature {
        TemporalFeature::Lag { column, lag } => {
            let series = series(column)?;
            let idx = series.len().checked_sub(1 + lag).ok_or_else(undefined)?;
            series[idx].ok_or_else(undefined)
        }
        TemporalFeature::Rolling { column, window } => {
            let series = series(column)?;
            let start = series.len().checked_sub(*window).ok_or_else(undefined)?;
            window_mean(&series[start..]).ok_or_else(undefined)
        }
        TemporalFeature::DayOfYear | TemporalFeature::Month => {
            feature.calendar_value(date).ok_or_else(undefined)
        }
    }
}

fn baselines(recent: &ObservationTable, names: &[String]) -> Result<Vec<f64>, InputError> {
    names.iter().map(|name| trailing_mean(recent, name)).collect()
}

/// Mean of the defined values of `column`.
fn trailing_mean(recent: &ObservationTable, column: &str) -> Result<f64, InputError> {
    let values = recent
        .column(column)
        .ok_or_else(|| InputError::MissingColumn(column.to_string()))?;
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        return Err(InputError::UndefinedBaseline(column.to_string()));
    }
    Ok(defined.iter().sum::<f64>() / defined.len() as f64)
}

fn forecast_table(last: NaiveDate, predictions: Vec<f64>) -> ForecastTable {
    let points = predictions
        .into_iter()
        .enumerate()
        .map(|(i, value)| ForecastPoint {
            date: last + Duration::days(i as i64 + 1),
            predicted_temp_avg: round2(value),
        })
        .collect();
    ForecastTable::new(points)
}
