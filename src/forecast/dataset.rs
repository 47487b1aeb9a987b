//! Training-set assembly
//!
//! Turns a cleaned observation table into the `(X, y, feature names)` triple
//! the trainer consumes: base meteorological columns first, temporal features
//! after, rows with any undefined value dropped.

use tracing::debug;

use super::features::TemporalFeatureBuilder;
use crate::domain::columns::{
    CLOUD_COVER_MEAN, DEW_POINT_AVG, EVAPOTRANSPIRATION, HUMIDITY_AVG, PRECIPITATION,
    SHORTWAVE_RADIATION, SOLAR_ENERGY, TEMP_AVG, TEMP_RANGE, WINDSPEED_MAX,
};
use crate::domain::ObservationTable;
use crate::error::InputError;
use crate::ml::training::TrainingDataset;

/// Base feature candidates in declaration order.
pub const BASE_FEATURES: [&str; 9] = [
    PRECIPITATION,
    WINDSPEED_MAX,
    SHORTWAVE_RADIATION,
    EVAPOTRANSPIRATION,
    HUMIDITY_AVG,
    DEW_POINT_AVG,
    CLOUD_COVER_MEAN,
    SOLAR_ENERGY,
    TEMP_RANGE,
];

#[derive(Debug, Clone)]
pub struct TrainingSetAssembler {
    pub builder: TemporalFeatureBuilder,
    /// When false only the base columns are used.
    pub include_temporal: bool,
}

impl Default for TrainingSetAssembler {
    fn default() -> Self {
        Self {
            builder: TemporalFeatureBuilder::default(),
            include_temporal: true,
        }
    }
}

impl TrainingSetAssembler {
    pub fn new(include_temporal: bool) -> Self {
        Self {
            include_temporal,
            ..Default::default()
        }
    }

    /// Base feature columns present in `table`, in declaration order.
    pub fn base_features(table: &ObservationTable) -> Vec<String> {
        BASE_FEATURES
            .iter()
            .filter(|name| table.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn assemble(&self, table: &ObservationTable) -> Result<TrainingDataset, InputError> {
        if table.is_empty() {
            return Err(InputError::EmptyTable);
        }
        if !table.has_column(TEMP_AVG) {
            return Err(InputError::MissingColumn(TEMP_AVG.to_string()));
        }

        let mut feature_names = Self::base_features(table);
        if feature_names.is_empty() {
            return Err(InputError::NoUsableFeatures);
        }

        let table = if self.include_temporal {
            let (augmented, temporal) = self.builder.build(table)?;
            feature_names.extend(temporal);
            augmented
        } else {
            table.sorted_by_date()
        };

        let columns: Vec<&[Option<f64>]> = feature_names
            .iter()
            .map(|name| {
                table
                    .column(name)
                    .ok_or_else(|| InputError::MissingColumn(name.clone()))
            })
            .collect::<Result<_, _>>()?;
        let target = table
            .column(TEMP_AVG)
            .ok_or_else(|| InputError::MissingColumn(TEMP_AVG.to_string()))?;

        let mut features = Vec::with_capacity(table.len());
        let mut targets = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(y) = target[row] else { continue };
            let values: Option<Vec<f64>> = columns.iter().map(|column| column[row]).collect();
            if let Some(values) = values {
                features.push(values);
                targets.push(y);
            }
        }

        let dropped = table.len() - features.len();
        if features.is_empty() {
            return Err(InputError::EmptyAfterFilter { dropped });
        }

        debug!(
            rows = features.len(),
            dropped,
            features = feature_names.len(),
            "training set assembled"
        );

        Ok(TrainingDataset {
            features,
            targets,
            feature_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn table(n: usize) -> ObservationTable {
        let observations = (0..n)
            .map(|i| {
                Observation::new(start() + Duration::days(i as i64))
                    .with(TEMP_AVG, 15.0 + 0.1 * i as f64)
                    .with(PRECIPITATION, 1.0)
                    .with(HUMIDITY_AVG, 70.0)
                    .with(TEMP_RANGE, 8.0)
            })
            .collect();
        ObservationTable::from_observations(observations).unwrap()
    }

    #[test]
    fn test_feature_order_base_then_temporal() {
        let dataset = TrainingSetAssembler::default().assemble(&table(30)).unwrap();
        let names = &dataset.feature_names;

        assert_eq!(&names[..3], &["precipitation", "humidity_avg", "temp_range"]);
        assert_eq!(names[3], "temp_avg_lag_1");
        assert_eq!(names.last().unwrap(), "month");
        assert_eq!(names.len(), 3 + 9 + 4 + 2);
    }

    #[test]
    fn test_head_rows_dropped() {
        let dataset = TrainingSetAssembler::default().assemble(&table(30)).unwrap();
        // lag_7 leaves the first 7 rows undefined
        assert_eq!(dataset.len(), 23);
        assert!((dataset.targets[0] - 15.7).abs() < 1e-9);
        assert!(dataset.features.iter().all(|r| r.len() == dataset.feature_names.len()));
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = TrainingSetAssembler::default();
        let t = table(20);
        assert_eq!(assembler.assemble(&t).unwrap(), assembler.assemble(&t).unwrap());
    }

    #[test]
    fn test_base_only() {
        let dataset = TrainingSetAssembler::new(false).assemble(&table(10)).unwrap();
        assert_eq!(dataset.feature_names.len(), 3);
        assert_eq!(dataset.len(), 10);
    }

    #[test]
    fn test_undefined_base_value_drops_row() {
        let t = table(5);
        let mut precip: Vec<Option<f64>> = t.column(PRECIPITATION).unwrap().to_vec();
        precip[2] = None;
        let t = t.with_column(PRECIPITATION, precip).unwrap();

        let dataset = TrainingSetAssembler::new(false).assemble(&t).unwrap();
        assert_eq!(dataset.len(), 4);
    }

    #[test]
    fn test_empty_table() {
        let empty = ObservationTable::new(vec![]).unwrap();
        assert_eq!(
            TrainingSetAssembler::default().assemble(&empty).unwrap_err(),
            InputError::EmptyTable
        );
    }

    #[test]
    fn test_missing_target() {
        let t = ObservationTable::new(vec![start()])
            .unwrap()
            .with_column(PRECIPITATION, vec![Some(1.0)])
            .unwrap();
        assert_eq!(
            TrainingSetAssembler::default().assemble(&t).unwrap_err(),
            InputError::MissingColumn(TEMP_AVG.to_string())
        );
    }

    #[test]
    fn test_no_usable_features() {
        let t = ObservationTable::new(vec![start()])
            .unwrap()
            .with_column(TEMP_AVG, vec![Some(1.0)])
            .unwrap();
        assert_eq!(
            TrainingSetAssembler::default().assemble(&t).unwrap_err(),
            InputError::NoUsableFeatures
        );
    }

    #[test]
    fn test_too_short_for_lags() {
        let err = TrainingSetAssembler::default().assemble(&table(5)).unwrap_err();
        assert_eq!(err, InputError::EmptyAfterFilter { dropped: 5 });
    }
}
