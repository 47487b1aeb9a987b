use chrono::NaiveDate;
use thiserror::Error;

/// Structurally invalid or insufficient observation data.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Observation table is empty")]
    EmptyTable,
    #[error("Required column '{0}' not found")]
    MissingColumn(String),
    #[error("Column '{name}' has {actual} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Duplicate observation date {0}")]
    DuplicateDate(NaiveDate),
    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("No usable features: none of the base feature columns are present")]
    NoUsableFeatures,
    #[error("No complete rows left after dropping {dropped} rows with undefined values")]
    EmptyAfterFilter { dropped: usize },
    #[error("Not enough rows for a holdout split: {rows}")]
    InsufficientRows { rows: usize },
    #[error("History has {available} rows, at least {required} are needed")]
    InsufficientHistory { required: usize, available: usize },
    #[error("Feature '{0}' has no defined values in the recent history")]
    UndefinedBaseline(String),
}

/// The artifact's feature list cannot be satisfied by the supplied history.
#[derive(Debug, Error, PartialEq)]
#[error("Model expects features missing from history: {}", missing.join(", "))]
pub struct FeatureMismatchError {
    pub missing: Vec<String>,
}

/// Failures raised by the regression backends.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot train on empty dataset")]
    EmptyDataset,
    #[error("Feature and target count mismatch: {rows} rows, {targets} targets")]
    TargetMismatch { rows: usize, targets: usize },
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("Model has not been fitted")]
    NotFitted,
    #[error("Backend failure: {0}")]
    Backend(String),
    #[error("Artifact encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Errors surfaced by a forecast call.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    FeatureMismatch(#[from] FeatureMismatchError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Invalid noise standard deviation {0}")]
    InvalidNoise(f64),
}

/// Errors surfaced by evaluate-then-refit.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Metrics calculation failed: {0}")]
    Metrics(#[from] crate::forecast::metrics::ForecastMetricsError),
}
