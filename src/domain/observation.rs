//! Daily observation table
//!
//! A columnar, date-keyed table of numeric meteorological fields. Values are
//! `Option<f64>`; `None` marks an undefined cell (missing reading, or a lag /
//! rolling value without enough history).

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Column names shared by the cleaning, feature and forecasting stages.
pub mod columns {
    pub const DATE: &str = "date";
    pub const TEMP_AVG: &str = "temp_avg";
    pub const TEMP_MAX: &str = "temp_max";
    pub const TEMP_MIN: &str = "temp_min";
    pub const TEMP_RANGE: &str = "temp_range";
    pub const PRECIPITATION: &str = "precipitation";
    pub const SUNSHINE_DURATION: &str = "sunshine_duration";
    pub const WINDSPEED_MAX: &str = "windspeed_10m_max";
    pub const SHORTWAVE_RADIATION: &str = "shortwave_radiation_sum";
    pub const EVAPOTRANSPIRATION: &str = "et0_fao_evapotranspiration";
    pub const HUMIDITY_MAX: &str = "relative_humidity_max";
    pub const HUMIDITY_MIN: &str = "relative_humidity_min";
    pub const HUMIDITY_AVG: &str = "humidity_avg";
    pub const DEW_POINT_MAX: &str = "dew_point_max";
    pub const DEW_POINT_MIN: &str = "dew_point_min";
    pub const DEW_POINT_AVG: &str = "dew_point_avg";
    pub const CLOUD_COVER_MEAN: &str = "cloud_cover_mean";
    pub const SOLAR_ENERGY: &str = "solar_energy";
    pub const HEAT_INDEX_EST: &str = "heat_index_est";
}

/// One calendar day of readings for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }
}

/// Date-keyed columnar table. Dates are unique; row order is whatever the
/// producer supplied until [`ObservationTable::sorted_by_date`] is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl ObservationTable {
    /// Create a table with a date column and no value columns.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, InputError> {
        let mut seen = HashSet::with_capacity(dates.len());
        for date in &dates {
            if !seen.insert(*date) {
                return Err(InputError::DuplicateDate(*date));
            }
        }
        Ok(Self {
            dates,
            columns: BTreeMap::new(),
        })
    }

    /// Build a table from row records; a column missing from a record is undefined there.
    pub fn from_observations(observations: Vec<Observation>) -> Result<Self, InputError> {
        let dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        let mut table = Self::new(dates)?;

        let names: Vec<String> = observations
            .iter()
            .flat_map(|o| o.values.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for name in names {
            let values = observations
                .iter()
                .map(|o| o.values.get(&name).copied())
                .collect();
            table.insert_column(name, values)?;
        }
        Ok(table)
    }

    /// Add or replace a column. NaN values are stored as undefined.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), InputError> {
        let name = name.into();
        if values.len() != self.dates.len() {
            return Err(InputError::ColumnLength {
                name,
                expected: self.dates.len(),
                actual: values.len(),
            });
        }
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, InputError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Value columns in lexical order (the date key is not included).
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.dates.iter().max().copied()
    }

    pub fn is_sorted(&self) -> bool {
        self.dates.windows(2).all(|w| w[0] < w[1])
    }

    /// Ascending by date. Already sorted input is returned unchanged.
    pub fn sorted_by_date(&self) -> Self {
        if self.is_sorted() {
            return self.clone();
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.dates[i]);
        self.take_rows(&order)
    }

    /// Keep rows whose mask entry is true, preserving order. The mask must
    /// have one entry per row.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self, InputError> {
        if keep.len() != self.len() {
            return Err(InputError::ColumnLength {
                name: "row mask".to_string(),
                expected: self.len(),
                actual: keep.len(),
            });
        }
        let rows: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        Ok(self.take_rows(&rows))
    }

    /// The last `n` rows in current order.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        let rows: Vec<usize> = (start..self.len()).collect();
        self.take_rows(&rows)
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), rows.iter().map(|&i| values[i]).collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let err = ObservationTable::new(vec![day(1), day(2), day(1)]).unwrap_err();
        assert_eq!(err, InputError::DuplicateDate(day(1)));
    }

    #[test]
    fn test_column_length_checked() {
        let table = ObservationTable::new(vec![day(1), day(2)]).unwrap();
        let err = table.with_column("temp_avg", vec![Some(1.0)]).unwrap_err();
        assert!(matches!(err, InputError::ColumnLength { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_nan_stored_as_undefined() {
        let table = ObservationTable::new(vec![day(1), day(2)])
            .unwrap()
            .with_column("x", vec![Some(f64::NAN), Some(2.0)])
            .unwrap();
        assert_eq!(table.column("x").unwrap(), &[None, Some(2.0)]);
    }

    #[test]
    fn test_sort_by_date_moves_values_with_dates() {
        let table = ObservationTable::new(vec![day(3), day(1), day(2)])
            .unwrap()
            .with_column("x", vec![Some(3.0), Some(1.0), Some(2.0)])
            .unwrap();

        let sorted = table.sorted_by_date();
        assert_eq!(sorted.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(sorted.column("x").unwrap(), &[Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(sorted.sorted_by_date(), sorted);
    }

    #[test]
    fn test_from_observations_fills_missing_cells() {
        let table = ObservationTable::from_observations(vec![
            Observation::new(day(1)).with("a", 1.0).with("b", 10.0),
            Observation::new(day(2)).with("a", 2.0),
        ])
        .unwrap();

        assert_eq!(table.column("a").unwrap(), &[Some(1.0), Some(2.0)]);
        assert_eq!(table.column("b").unwrap(), &[Some(10.0), None]);
        assert_eq!(table.max_date(), Some(day(2)));
    }

    #[test]
    fn test_tail_and_filter() {
        let table = ObservationTable::new(vec![day(1), day(2), day(3)])
            .unwrap()
            .with_column("x", vec![Some(1.0), None, Some(3.0)])
            .unwrap();

        assert_eq!(table.tail(2).dates(), &[day(2), day(3)]);
        assert_eq!(table.tail(10).len(), 3);

        let filtered = table.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(filtered.column("x").unwrap(), &[Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_filter_rows_rejects_short_mask() {
        let table = ObservationTable::new(vec![day(1), day(2), day(3)]).unwrap();
        let err = table.filter_rows(&[true, false]).unwrap_err();
        assert!(matches!(err, InputError::ColumnLength { expected: 3, actual: 2, .. }));
    }
}
