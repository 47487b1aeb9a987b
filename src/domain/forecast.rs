use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    /// Predicted daily mean temperature (°C, 2 dp)
    pub predicted_temp_avg: f64,
}

/// Contiguous run of daily predictions starting the day after the last observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    pub points: Vec<ForecastPoint>,
}

impl ForecastTable {
    pub fn new(points: Vec<ForecastPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted_temp_avg).collect()
    }
}

/// Round to two decimal places, the precision used for persisted outputs.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
