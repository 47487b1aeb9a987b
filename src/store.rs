//! On-disk persistence for one location's data and results
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/<slug>/raw/<slug>_weather_raw.csv
//! <root>/<slug>/processed/<slug>_weather_clean.csv
//! <root>/<slug>/models/<slug>_temp_model.bin
//! <root>/<slug>/results/<slug>_model_metrics.json
//! <root>/<slug>/results/<slug>_features.json
//! <root>/<slug>/results/<slug>_forecast.csv
//! <root>/<slug>/results/<slug>_weather_summary.json
//! ```
//!
//! Every run writes only under its own slug, so concurrent locations never
//! share a file.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::columns::DATE;
use crate::domain::{ForecastPoint, ForecastTable, ObservationTable};
use crate::error::InputError;
use crate::forecast::metrics::HoldoutMetrics;
use crate::ml::ModelArtifact;
use crate::summary::WeatherSummary;

/// Directory and file-name key for a location: lower case, spaces as `_`.
pub fn city_slug(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Feature metadata written next to the metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub total_features: usize,
    pub features: Vec<String>,
}

impl FeatureMetadata {
    pub fn new(features: &[String]) -> Self {
        Self {
            total_features: features.len(),
            features: features.to_vec(),
        }
    }
}

/// Paths for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPaths {
    slug: String,
    dir: PathBuf,
}

impl LocationPaths {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn raw_csv(&self) -> PathBuf {
        self.file("raw", "weather_raw.csv")
    }

    pub fn processed_csv(&self) -> PathBuf {
        self.file("processed", "weather_clean.csv")
    }

    pub fn model(&self) -> PathBuf {
        self.file("models", "temp_model.bin")
    }

    pub fn metrics(&self) -> PathBuf {
        self.file("results", "model_metrics.json")
    }

    pub fn features(&self) -> PathBuf {
        self.file("results", "features.json")
    }

    pub fn forecast(&self) -> PathBuf {
        self.file("results", "forecast.csv")
    }

    pub fn weather_summary(&self) -> PathBuf {
        self.file("results", "weather_summary.json")
    }

    fn file(&self, subdir: &str, suffix: &str) -> PathBuf {
        self.dir.join(subdir).join(format!("{}_{}", self.slug, suffix))
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self, city: &str) -> LocationPaths {
        let slug = city_slug(city);
        LocationPaths {
            dir: self.root.join(&slug),
            slug,
        }
    }

    /// Write the artifact to a temporary file beside the target, then rename
    /// it into place. An interrupted run leaves the previous artifact intact.
    pub fn save_artifact(&self, city: &str, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.location(city).model();
        let bytes = artifact.to_bytes().context("Failed to encode model artifact")?;
        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "artifact saved");
        Ok(path)
    }

    pub fn load_artifact(&self, city: &str) -> Result<ModelArtifact> {
        let path = self.location(city).model();
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        ModelArtifact::from_bytes(&bytes)
            .with_context(|| format!("Failed to decode model artifact {}", path.display()))
    }

    pub fn save_metrics(&self, city: &str, metrics: &HoldoutMetrics) -> Result<PathBuf> {
        let path = self.location(city).metrics();
        write_json(&path, metrics)?;
        Ok(path)
    }

    pub fn load_metrics(&self, city: &str) -> Result<HoldoutMetrics> {
        read_json(&self.location(city).metrics())
    }

    pub fn save_features(&self, city: &str, features: &[String]) -> Result<PathBuf> {
        let path = self.location(city).features();
        write_json(&path, &FeatureMetadata::new(features))?;
        Ok(path)
    }

    pub fn load_features(&self, city: &str) -> Result<FeatureMetadata> {
        read_json(&self.location(city).features())
    }

    pub fn save_weather_summary(&self, city: &str, summary: &WeatherSummary) -> Result<PathBuf> {
        let path = self.location(city).weather_summary();
        write_json(&path, summary)?;
        Ok(path)
    }

    pub fn load_weather_summary(&self, city: &str) -> Result<WeatherSummary> {
        read_json(&self.location(city).weather_summary())
    }

    pub fn save_forecast(&self, city: &str, forecast: &ForecastTable) -> Result<PathBuf> {
        let path = self.location(city).forecast();
        ensure_parent(&path)?;
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for point in &forecast.points {
            writer.serialize(point)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Remove a forecast left by an earlier run. Absent files are fine.
    pub fn clear_forecast(&self, city: &str) -> Result<()> {
        let path = self.location(city).forecast();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    pub fn load_forecast(&self, city: &str) -> Result<ForecastTable> {
        let path = self.location(city).forecast();
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let points = reader
            .deserialize::<ForecastPoint>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Malformed forecast file {}", path.display()))?;
        Ok(ForecastTable::new(points))
    }

    pub fn save_processed(&self, city: &str, table: &ObservationTable) -> Result<PathBuf> {
        let path = self.location(city).processed_csv();
        write_observations_csv(&path, table)?;
        Ok(path)
    }

    pub fn load_processed(&self, city: &str) -> Result<ObservationTable> {
        read_observations_csv(&self.location(city).processed_csv())
    }

    pub fn save_raw(&self, city: &str, table: &ObservationTable) -> Result<PathBuf> {
        let path = self.location(city).raw_csv();
        write_observations_csv(&path, table)?;
        Ok(path)
    }

    pub fn load_raw(&self, city: &str) -> Result<ObservationTable> {
        read_observations_csv(&self.location(city).raw_csv())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move artifact into {}", path.display()))?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Malformed JSON in {}", path.display()))
}

/// Write `date` followed by every value column; undefined cells are empty.
pub fn write_observations_csv(path: &Path, table: &ObservationTable) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let names: Vec<&str> = table.column_names().collect();
    let mut header = vec![DATE];
    header.extend(&names);
    writer.write_record(&header)?;

    let columns: Vec<&[Option<f64>]> = names
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    for (row, date) in table.dates().iter().enumerate() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| c[row].map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read an observation CSV with a `date` column. Empty, `nan` and
/// non-numeric cells are undefined.
pub fn read_observations_csv(path: &Path) -> Result<ObservationTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h == DATE)
        .ok_or_else(|| InputError::MissingColumn(DATE.to_string()))
        .with_context(|| format!("No date column in {}", path.display()))?;
    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); value_columns.len()];
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.with_context(|| format!("{}:{}", path.display(), line))?;
        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = parse_date(raw_date).with_context(|| format!("{}:{}", path.display(), line))?;
        dates.push(date);
        for (slot, (col, _)) in values.iter_mut().zip(&value_columns) {
            slot.push(record.get(*col).and_then(parse_cell));
        }
    }

    let mut table = ObservationTable::new(dates)
        .with_context(|| format!("Invalid observation table {}", path.display()))?;
    for ((_, name), column) in value_columns.into_iter().zip(values) {
        table.insert_column(name, column)?;
    }
    debug!(path = %path.display(), rows = table.len(), "observations loaded");
    Ok(table)
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Result<NaiveDate, InputError> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| InputError::InvalidDate(raw.to_string()))
}

fn parse_cell(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_city_slug() {
        assert_eq!(city_slug("Puerto Montt"), "puerto_montt");
        assert_eq!(city_slug(" Santiago "), "santiago");
    }

    #[test]
    fn test_location_paths() {
        let store = ArtifactStore::new("/data");
        let paths = store.location("Puerto Montt");
        assert_eq!(
            paths.model(),
            PathBuf::from("/data/puerto_montt/models/puerto_montt_temp_model.bin")
        );
        assert_eq!(
            paths.metrics(),
            PathBuf::from("/data/puerto_montt/results/puerto_montt_model_metrics.json")
        );
        assert_eq!(
            paths.processed_csv(),
            PathBuf::from("/data/puerto_montt/processed/puerto_montt_weather_clean.csv")
        );
    }

    #[test]
    fn test_observation_csv_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let table = ObservationTable::from_observations(vec![
            Observation::new(day(1)).with("temp_avg", 14.5).with("precipitation", 0.2),
            Observation::new(day(2)).with("temp_avg", 15.25),
        ])
        .unwrap();

        store.save_processed("Santiago", &table).unwrap();
        let loaded = store.load_processed("Santiago").unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_read_csv_undefined_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("obs.csv");
        fs::write(
            &path,
            "temp_max,date,temp_min\n20.5,2024-01-02,nan\n,2024-01-01 00:00:00,9\n",
        )
        .unwrap();

        let table = read_observations_csv(&path).unwrap();
        assert_eq!(table.dates(), &[day(2), day(1)]);
        assert_eq!(table.column("temp_max").unwrap(), &[Some(20.5), None]);
        assert_eq!(table.column("temp_min").unwrap(), &[None, Some(9.0)]);
    }

    #[test]
    fn test_read_csv_requires_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("obs.csv");
        fs::write(&path, "temp_max\n1\n").unwrap();
        let err = read_observations_csv(&path).unwrap_err();
        assert!(err.to_string().contains("No date column"));
    }

    #[test]
    fn test_read_csv_invalid_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("obs.csv");
        fs::write(&path, "date,temp_max\n01/02/2024,1\n").unwrap();
        let err = read_observations_csv(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::InvalidDate("01/02/2024".to_string()))
        );
    }

    #[test]
    fn test_metrics_and_features_json() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .save_metrics("Antofagasta", &HoldoutMetrics { mae: 0.42, rmse: 0.5 })
            .unwrap();
        let raw = fs::read_to_string(path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["MAE"], 0.42);
        assert_eq!(json["RMSE"], 0.5);

        store
            .save_features("Antofagasta", &["a".to_string(), "b".to_string()])
            .unwrap();
        let meta = store.load_features("Antofagasta").unwrap();
        assert_eq!(meta.total_features, 2);
        assert_eq!(meta.features, vec!["a", "b"]);
    }

    #[test]
    fn test_weather_summary_json() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let table = ObservationTable::from_observations(vec![
            Observation::new(day(1))
                .with("temp_avg", 15.0)
                .with("temp_max", 21.0)
                .with("temp_min", 9.0)
                .with("precipitation", 0.5),
            Observation::new(day(2))
                .with("temp_avg", 16.0)
                .with("temp_max", 22.0)
                .with("temp_min", 10.0)
                .with("precipitation", 1.0),
        ])
        .unwrap();
        let summary = WeatherSummary::from_table(&table).unwrap();

        let path = store.save_weather_summary("Puerto Montt", &summary).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("puerto_montt/results/puerto_montt_weather_summary.json")
        );
        assert_eq!(store.load_weather_summary("Puerto Montt").unwrap(), summary);
    }

    #[test]
    fn test_forecast_csv() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let forecast = ForecastTable::new(vec![
            ForecastPoint { date: day(5), predicted_temp_avg: 16.1 },
            ForecastPoint { date: day(6), predicted_temp_avg: 16.25 },
        ]);

        let path = store.save_forecast("Concepcion", &forecast).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("date,predicted_temp_avg\n2024-01-05,16.1\n"));
        assert_eq!(store.load_forecast("Concepcion").unwrap(), forecast);

        store.clear_forecast("Concepcion").unwrap();
        assert!(!store.location("Concepcion").forecast().exists());
        store.clear_forecast("Concepcion").unwrap();
    }

    #[test]
    fn test_missing_artifact_names_path() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.load_artifact("Nowhere").unwrap_err();
        assert!(err.to_string().contains("nowhere_temp_model.bin"));
    }
}
