use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;

use crate::forecast::ForecastConfig;
use crate::ml::gradient_boosting::GradientBoostingParams;
use crate::ml::smartcore::RandomForestParams;
use crate::ml::training::TrainingConfig;
use crate::ml::ModelFamily;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "METEO__";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig { pub root_dir: PathBuf }

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Preferred family; unset resolves to gradient boosting.
    pub family: Option<ModelFamily>,
    pub gradient_boosting: GradientBoostingParams,
    pub random_forest: RandomForestParams,
}

impl ModelConfig {
    /// Trainer settings for the family resolved at start-up.
    pub fn training_config(&self, family: ModelFamily) -> TrainingConfig {
        TrainingConfig {
            family,
            gradient_boosting: self.gradient_boosting,
            random_forest: self.random_forest,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig { pub train_fraction: f64 }

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { train_fraction: 0.75 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig { pub temporal: bool }

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { temporal: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(figment.extract()?)
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        let fraction = self.evaluation.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(format!("evaluation.train_fraction must be in (0, 1): {}", fraction));
        }
        if self.forecast.days_ahead == 0 {
            return Err("forecast.days_ahead must be at least 1".to_string());
        }
        if self.forecast.baseline_window == 0 {
            return Err("forecast.baseline_window must be at least 1".to_string());
        }
        if !(self.forecast.noise_std >= 0.0) || !self.forecast.noise_std.is_finite() {
            return Err(format!("forecast.noise_std must be finite and >= 0: {}", self.forecast.noise_std));
        }
        if self.locations.is_empty() {
            return Err("at least one location must be configured".to_string());
        }
        for location in &self.locations {
            if location.name.trim().is_empty() {
                return Err("location name must not be empty".to_string());
            }
            if !(-90.0..=90.0).contains(&location.latitude) {
                return Err(format!("{}: latitude out of range: {}", location.name, location.latitude));
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                return Err(format!("{}: longitude out of range: {}", location.name, location.longitude));
            }
        }
        let gb = &self.model.gradient_boosting;
        if gb.n_estimators == 0 || !(gb.learning_rate > 0.0) {
            return Err("model.gradient_boosting needs n_estimators >= 1 and learning_rate > 0".to_string());
        }
        if !(gb.subsample > 0.0 && gb.subsample <= 1.0) || !(gb.colsample_bytree > 0.0 && gb.colsample_bytree <= 1.0) {
            return Err("model.gradient_boosting subsample ratios must be in (0, 1]".to_string());
        }
        if self.model.random_forest.n_trees == 0 {
            return Err("model.random_forest.n_trees must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastStrategy;
    use figment::Jail;

    const MINIMAL: &str = r#"
        [data]
        root_dir = "data"

        [[locations]]
        name = "Santiago"
        latitude = -33.45
        longitude = -70.66
    "#;

    fn load() -> figment::error::Result<Config> {
        Config::load().map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(DEFAULT_CONFIG_PATH, MINIMAL)?;

            let cfg = load()?;
            assert_eq!(cfg.data.root_dir, PathBuf::from("data"));
            assert_eq!(cfg.model.family, None);
            assert_eq!(cfg.evaluation.train_fraction, 0.75);
            assert!(cfg.features.temporal);
            assert_eq!(cfg.forecast.days_ahead, 3);
            assert_eq!(cfg.forecast.strategy, ForecastStrategy::Strict);
            assert_eq!(cfg.model.gradient_boosting.n_estimators, 300);
            assert_eq!(cfg.model.random_forest.max_depth, 12);
            assert_eq!(cfg.locations.len(), 1);
            assert!(cfg.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_shipped_defaults() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(DEFAULT_CONFIG_PATH, include_str!("../config/default.toml"))?;

            let cfg = load()?;
            assert_eq!(cfg.forecast.strategy, ForecastStrategy::Strict);
            assert_eq!(cfg.model.family, Some(ModelFamily::GradientBoosting));
            assert!(cfg.features.temporal);
            assert_eq!(cfg.locations.len(), 4);
            assert!(cfg.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(DEFAULT_CONFIG_PATH, MINIMAL)?;
            jail.set_env("METEO__FORECAST__DAYS_AHEAD", "7");
            jail.set_env("METEO__FORECAST__STRATEGY", "recursive");
            jail.set_env("METEO__MODEL__FAMILY", "random_forest");

            let cfg = load()?;
            assert_eq!(cfg.forecast.days_ahead, 7);
            assert_eq!(cfg.forecast.strategy, ForecastStrategy::Recursive);
            assert_eq!(cfg.model.family, Some(ModelFamily::RandomForest));
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(DEFAULT_CONFIG_PATH, MINIMAL)?;
            let cfg = load()?;

            let mut bad = cfg.clone();
            bad.evaluation.train_fraction = 1.0;
            assert!(bad.validate().is_err());

            let mut bad = cfg.clone();
            bad.forecast.noise_std = -0.1;
            assert!(bad.validate().is_err());

            let mut bad = cfg.clone();
            bad.locations.clear();
            assert!(bad.validate().is_err());

            let mut bad = cfg;
            bad.locations[0].latitude = 120.0;
            assert!(bad.validate().is_err());
            Ok(())
        });
    }

    #[test]
    fn test_training_config_uses_resolved_family() {
        let model = ModelConfig::default();
        let training = model.training_config(ModelFamily::resolve(model.family));
        assert_eq!(training.family, ModelFamily::GradientBoosting);
        assert_eq!(training.gradient_boosting.n_estimators, 300);

        let fallback = ModelConfig {
            family: Some(ModelFamily::RandomForest),
            ..Default::default()
        };
        let training = fallback.training_config(ModelFamily::resolve(fallback.family));
        assert_eq!(training.family, ModelFamily::RandomForest);
    }
}
