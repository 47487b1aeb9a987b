//! Descriptive weather summary for one location's cleaned observations.
//!
//! Means skip undefined cells. A mean over a column with no defined value,
//! or over an absent optional column, is `None` (`null` in JSON).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::columns::*;
use crate::domain::{round2, ObservationTable};
use crate::error::InputError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub date_range: DateRange,
    pub temperature: TemperatureSummary,
    pub precipitation: PrecipitationSummary,
    pub humidity: HumiditySummary,
    pub solar: SolarSummary,
    pub records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSummary {
    pub avg: Option<f64>,
    pub max_mean: Option<f64>,
    pub min_mean: Option<f64>,
    pub range_avg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecipitationSummary {
    pub total: f64,
    pub avg_daily: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumiditySummary {
    pub avg: Option<f64>,
    pub dew_point_avg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarSummary {
    pub energy_avg: Option<f64>,
}

impl WeatherSummary {
    /// Summarise a cleaned table. `temp_avg`, `temp_max`, `temp_min` and
    /// `precipitation` are required; the other columns are optional.
    pub fn from_table(table: &ObservationTable) -> Result<Self, InputError> {
        let (start, end) = match (table.dates().iter().min(), table.dates().iter().max()) {
            (Some(start), Some(end)) => (*start, *end),
            _ => return Err(InputError::EmptyTable),
        };

        let precipitation = required(table, PRECIPITATION)?;
        let total = precipitation.iter().flatten().sum::<f64>();

        Ok(Self {
            date_range: DateRange { start, end },
            temperature: TemperatureSummary {
                avg: mean(required(table, TEMP_AVG)?),
                max_mean: mean(required(table, TEMP_MAX)?),
                min_mean: mean(required(table, TEMP_MIN)?),
                range_avg: optional_mean(table, TEMP_RANGE),
            },
            precipitation: PrecipitationSummary {
                total: round2(total),
                avg_daily: mean(precipitation),
            },
            humidity: HumiditySummary {
                avg: optional_mean(table, HUMIDITY_AVG),
                dew_point_avg: optional_mean(table, DEW_POINT_AVG),
            },
            solar: SolarSummary {
                energy_avg: optional_mean(table, SOLAR_ENERGY),
            },
            records: table.len(),
        })
    }
}

fn required<'a>(table: &'a ObservationTable, column: &str) -> Result<&'a [Option<f64>], InputError> {
    table
        .column(column)
        .ok_or_else(|| InputError::MissingColumn(column.to_string()))
}

fn optional_mean(table: &ObservationTable, column: &str) -> Option<f64> {
    table.column(column).and_then(mean)
}

/// Two-decimal mean of the defined values.
fn mean(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        return None;
    }
    Some(round2(defined.iter().sum::<f64>() / defined.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn table() -> ObservationTable {
        ObservationTable::from_observations(vec![
            Observation::new(day(3))
                .with(TEMP_AVG, 14.0)
                .with(TEMP_MAX, 20.0)
                .with(TEMP_MIN, 8.0)
                .with(PRECIPITATION, 1.25)
                .with(HUMIDITY_AVG, 71.0),
            Observation::new(day(1))
                .with(TEMP_AVG, 15.0)
                .with(TEMP_MAX, 21.0)
                .with(TEMP_MIN, 9.0)
                .with(PRECIPITATION, 0.0),
            Observation::new(day(2))
                .with(TEMP_AVG, 16.333)
                .with(TEMP_MAX, 22.0)
                .with(TEMP_MIN, 10.0)
                .with(PRECIPITATION, 2.5)
                .with(HUMIDITY_AVG, 64.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_summary_values() {
        let summary = WeatherSummary::from_table(&table()).unwrap();

        assert_eq!(summary.date_range, DateRange { start: day(1), end: day(3) });
        assert_eq!(summary.records, 3);
        assert_eq!(summary.temperature.avg, Some(15.11));
        assert_eq!(summary.temperature.max_mean, Some(21.0));
        assert_eq!(summary.temperature.min_mean, Some(9.0));
        assert_eq!(summary.temperature.range_avg, None);
        assert_eq!(summary.precipitation.total, 3.75);
        assert_eq!(summary.precipitation.avg_daily, Some(1.25));
        // the undefined cell on day 1 is skipped
        assert_eq!(summary.humidity.avg, Some(67.5));
        assert_eq!(summary.humidity.dew_point_avg, None);
        assert_eq!(summary.solar.energy_avg, None);
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = WeatherSummary::from_table(&table()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["date_range"]["start"], "2024-05-01");
        assert_eq!(json["date_range"]["end"], "2024-05-03");
        assert_eq!(json["precipitation"]["total"], 3.75);
        assert!(json["solar"]["energy_avg"].is_null());
        assert_eq!(json["records"], 3);
    }

    #[test]
    fn test_summary_errors() {
        let empty = ObservationTable::new(vec![]).unwrap();
        assert_eq!(
            WeatherSummary::from_table(&empty).unwrap_err(),
            InputError::EmptyTable
        );

        let no_rain = ObservationTable::from_observations(vec![Observation::new(day(1))
            .with(TEMP_AVG, 1.0)
            .with(TEMP_MAX, 2.0)
            .with(TEMP_MIN, 0.0)])
        .unwrap();
        assert_eq!(
            WeatherSummary::from_table(&no_rain).unwrap_err(),
            InputError::MissingColumn(PRECIPITATION.to_string())
        );
    }
}
