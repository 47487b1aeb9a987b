//! Raw daily weather → cleaned observation table
//!
//! Drops days without a temperature reading, derives the averaged and
//! combined columns the models use, imputes gaps with column means and rounds
//! the headline columns to two decimals.

use tracing::debug;

use crate::domain::columns::*;
use crate::domain::{round2, ObservationTable};
use crate::error::InputError;

/// Columns whose undefined cells are replaced by the column mean (0 when the
/// column has no defined value at all).
pub const IMPUTED_COLUMNS: [&str; 11] = [
    PRECIPITATION,
    SUNSHINE_DURATION,
    WINDSPEED_MAX,
    SHORTWAVE_RADIATION,
    EVAPOTRANSPIRATION,
    HUMIDITY_AVG,
    DEW_POINT_AVG,
    CLOUD_COVER_MEAN,
    SOLAR_ENERGY,
    HEAT_INDEX_EST,
    TEMP_RANGE,
];

pub const ROUNDED_COLUMNS: [&str; 5] = [TEMP_MAX, TEMP_MIN, TEMP_AVG, PRECIPITATION, SOLAR_ENERGY];

pub fn clean_observations(raw: &ObservationTable) -> Result<ObservationTable, InputError> {
    let max = raw
        .column(TEMP_MAX)
        .ok_or_else(|| InputError::MissingColumn(TEMP_MAX.to_string()))?;
    let min = raw
        .column(TEMP_MIN)
        .ok_or_else(|| InputError::MissingColumn(TEMP_MIN.to_string()))?;

    let keep: Vec<bool> = max
        .iter()
        .zip(min)
        .map(|(hi, lo)| hi.is_some() && lo.is_some())
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    let mut table = raw.filter_rows(&keep)?.sorted_by_date();
    if table.is_empty() {
        return Err(InputError::EmptyTable);
    }

    let temp_max = required(&table, TEMP_MAX)?;
    let temp_min = required(&table, TEMP_MIN)?;
    let temp_avg = combine(&temp_max, &temp_min, |hi, lo| (hi + lo) / 2.0);
    let temp_range = combine(&temp_max, &temp_min, |hi, lo| hi - lo);

    let humidity_avg = average_of(&table, HUMIDITY_MAX, HUMIDITY_MIN);
    let dew_point_avg = average_of(&table, DEW_POINT_MAX, DEW_POINT_MIN);
    let heat_index = combine(&temp_avg, &humidity_avg, |t, h| t + 0.1 * h);
    let solar_energy = match table.column(SHORTWAVE_RADIATION) {
        Some(values) => values.iter().map(|v| Some(v.unwrap_or(0.0))).collect(),
        None => vec![Some(0.0); table.len()],
    };

    table.insert_column(TEMP_AVG, temp_avg)?;
    table.insert_column(TEMP_RANGE, temp_range)?;
    table.insert_column(HUMIDITY_AVG, humidity_avg)?;
    table.insert_column(DEW_POINT_AVG, dew_point_avg)?;
    table.insert_column(HEAT_INDEX_EST, heat_index)?;
    table.insert_column(SOLAR_ENERGY, solar_energy)?;

    for column in IMPUTED_COLUMNS {
        if let Some(values) = table.column(column) {
            let filled = impute_mean(values);
            table.insert_column(column, filled)?;
        }
    }

    for column in ROUNDED_COLUMNS {
        if let Some(values) = table.column(column) {
            let rounded = values.iter().map(|v| v.map(round2)).collect();
            table.insert_column(column, rounded)?;
        }
    }

    debug!(rows = table.len(), dropped, "observations cleaned");
    Ok(table)
}

fn required(table: &ObservationTable, column: &str) -> Result<Vec<Option<f64>>, InputError> {
    table
        .column(column)
        .map(<[Option<f64>]>::to_vec)
        .ok_or_else(|| InputError::MissingColumn(column.to_string()))
}

fn combine(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| Some(f((*x)?, (*y)?)))
        .collect()
}

/// Element-wise mean of two columns; all undefined when either is absent.
fn average_of(table: &ObservationTable, hi: &str, lo: &str) -> Vec<Option<f64>> {
    match (table.column(hi), table.column(lo)) {
        (Some(hi), Some(lo)) => combine(hi, lo, |a, b| (a + b) / 2.0),
        _ => vec![None; table.len()],
    }
}

/// Replace undefined cells with the mean of the defined ones, or 0.
pub fn impute_mean(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    let fill = if defined.is_empty() {
        0.0
    } else {
        defined.iter().sum::<f64>() / defined.len() as f64
    };
    values.iter().map(|v| Some(v.unwrap_or(fill))).collect()
}
