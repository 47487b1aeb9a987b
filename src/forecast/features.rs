//! Temporal feature engineering
//!
//! Derives lag, trailing rolling-mean and calendar features from a
//! date-ordered observation table. Offsets are counted in rows of the sorted
//! table, not in calendar days.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::domain::columns::{HUMIDITY_AVG, PRECIPITATION, TEMP_AVG};
use crate::domain::ObservationTable;
use crate::error::InputError;

pub const DAY_OF_YEAR: &str = "day_of_year";
pub const MONTH: &str = "month";

/// A feature computed from a column's own history or from the date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalFeature {
    Lag { column: String, lag: usize },
    Rolling { column: String, window: usize },
    DayOfYear,
    Month,
}

impl TemporalFeature {
    pub fn name(&self) -> String {
        match self {
            Self::Lag { column, lag } => format!("{column}_lag_{lag}"),
            Self::Rolling { column, window } => format!("{column}_rolling_{window}"),
            Self::DayOfYear => DAY_OF_YEAR.to_string(),
            Self::Month => MONTH.to_string(),
        }
    }

    /// Recognise a feature name produced by [`TemporalFeature::name`].
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            DAY_OF_YEAR => return Some(Self::DayOfYear),
            MONTH => return Some(Self::Month),
            _ => {}
        }
        if let Some((column, lag)) = name.rsplit_once("_lag_") {
            let lag = lag.parse().ok().filter(|&k: &usize| k > 0)?;
            return Some(Self::Lag {
                column: column.to_string(),
                lag,
            });
        }
        if let Some((column, window)) = name.rsplit_once("_rolling_") {
            let window = window.parse().ok().filter(|&w: &usize| w > 0)?;
            return Some(Self::Rolling {
                column: column.to_string(),
                window,
            });
        }
        None
    }

    /// Source column for lag / rolling features.
    pub fn source_column(&self) -> Option<&str> {
        match self {
            Self::Lag { column, .. } | Self::Rolling { column, .. } => Some(column.as_str()),
            Self::DayOfYear | Self::Month => None,
        }
    }

    /// Rows of history needed before this feature is defined.
    pub fn required_history(&self) -> usize {
        match self {
            Self::Lag { lag, .. } => *lag,
            Self::Rolling { window, .. } => window.saturating_sub(1),
            Self::DayOfYear | Self::Month => 0,
        }
    }

    /// Calendar value for a date; `None` for history-based features.
    pub fn calendar_value(&self, date: NaiveDate) -> Option<f64> {
        match self {
            Self::DayOfYear => Some(date.ordinal() as f64),
            Self::Month => Some(date.month() as f64),
            _ => None,
        }
    }
}

/// Lag and rolling configuration for [`TemporalFeatureBuilder`].
#[derive(Debug, Clone)]
pub struct TemporalFeatureBuilder {
    pub lag_columns: Vec<String>,
    pub lags: Vec<usize>,
    pub rolling_columns: Vec<String>,
    pub rolling_windows: Vec<usize>,
}

impl Default for TemporalFeatureBuilder {
    fn default() -> Self {
        Self {
            lag_columns: vec![
                TEMP_AVG.to_string(),
                PRECIPITATION.to_string(),
                HUMIDITY_AVG.to_string(),
            ],
            lags: vec![1, 3, 7],
            rolling_columns: vec![TEMP_AVG.to_string(), PRECIPITATION.to_string()],
            rolling_windows: vec![3, 7],
        }
    }
}

impl TemporalFeatureBuilder {
    /// Features this builder emits for `table`, in creation order:
    /// lags, then rolling means, then calendar attributes. Columns absent
    /// from the table are skipped.
    pub fn planned_features(&self, table: &ObservationTable) -> Vec<TemporalFeature> {
        let mut features = Vec::new();

        for column in self.lag_columns.iter().filter(|c| table.has_column(c)) {
            for &lag in &self.lags {
                features.push(TemporalFeature::Lag {
                    column: column.clone(),
                    lag,
                });
            }
        }

        for column in self.rolling_columns.iter().filter(|c| table.has_column(c)) {
            for &window in &self.rolling_windows {
                features.push(TemporalFeature::Rolling {
                    column: column.clone(),
                    window,
                });
            }
        }

        features.push(TemporalFeature::DayOfYear);
        features.push(TemporalFeature::Month);
        features
    }

    /// Sort `table` by date and append the temporal feature columns.
    ///
    /// Returns the augmented table and the new column names in creation order.
    pub fn build(
        &self,
        table: &ObservationTable,
    ) -> Result<(ObservationTable, Vec<String>), InputError> {
        let mut out = table.sorted_by_date();
        let features = self.planned_features(&out);
        let mut created = Vec::with_capacity(features.len());

        for feature in &features {
            let values = compute_feature(&out, feature)?;
            let name = feature.name();
            out.insert_column(name.clone(), values)?;
            created.push(name);
        }

        debug!(
            rows = out.len(),
            features = created.len(),
            "temporal features built"
        );
        Ok((out, created))
    }
}

fn compute_feature(
    table: &ObservationTable,
    feature: &TemporalFeature,
) -> Result<Vec<Option<f64>>, InputError> {
    let source = |column: &str| {
        table
            .column(column)
            .ok_or_else(|| InputError::MissingColumn(column.to_string()))
    };

    Ok(match feature {
        TemporalFeature::Lag { column, lag } => lag_values(source(column)?, *lag),
        TemporalFeature::Rolling { column, window } => rolling_mean(source(column)?, *window),
        TemporalFeature::DayOfYear | TemporalFeature::Month => table
            .dates()
            .iter()
            .map(|d| feature.calendar_value(*d))
            .collect(),
    })
}

/// Value `lag` rows earlier; undefined for the first `lag` rows.
pub fn lag_values(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(lag).and_then(|j| values[j]))
        .collect()
}

/// Trailing mean over `window` rows including the current one. Undefined for
/// the first `window - 1` rows and wherever the window holds an undefined value.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            window_mean(&values[i + 1 - window..=i])
        })
        .collect()
}

/// Mean of a window where every value must be defined.
pub fn window_mean(window: &[Option<f64>]) -> Option<f64> {
    let sum = window.iter().copied().sum::<Option<f64>>()?;
    Some(sum / window.len() as f64)
}
