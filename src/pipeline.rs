//! Per-location pipeline
//!
//! cleaned observations → training set → evaluate-then-refit → artifact →
//! forecast, with the results optionally persisted through an
//! [`ArtifactStore`]. One instance owns nothing shared, so locations can run
//! in parallel.

use anyhow::{Context, Result};
use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::domain::{ForecastTable, ObservationTable};
use crate::error::ForecastError;
use crate::forecast::{ForecastConfig, Forecaster, TrainingSetAssembler};
use crate::ml::evaluation::{Evaluation, HoldoutEvaluator};
use crate::ml::training::{ModelTrainer, TrainingConfig};
use crate::ml::{ModelArtifact, ModelFamily};
use crate::store::ArtifactStore;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub training: TrainingConfig,
    pub train_fraction: f64,
    pub include_temporal: bool,
    pub forecast: ForecastConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            train_fraction: 0.75,
            include_temporal: true,
            forecast: ForecastConfig::default(),
        }
    }
}

impl PipelineSettings {
    /// Settings for a run whose model family was resolved at start-up.
    pub fn from_config(config: &Config, family: ModelFamily) -> Self {
        Self {
            training: config.model.training_config(family),
            train_fraction: config.evaluation.train_fraction,
            include_temporal: config.features.temporal,
            forecast: config.forecast.clone(),
        }
    }
}

/// Everything one run produces. A refused forecast leaves the trained
/// artifact and its evaluation intact.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub artifact: ModelArtifact,
    pub evaluation: Evaluation,
    pub forecast: Result<ForecastTable, ForecastError>,
}

pub struct WeatherPipeline {
    assembler: TrainingSetAssembler,
    trainer: ModelTrainer,
    evaluator: HoldoutEvaluator,
    forecaster: Forecaster,
}

impl WeatherPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            assembler: TrainingSetAssembler::new(settings.include_temporal),
            trainer: ModelTrainer::new(settings.training),
            evaluator: HoldoutEvaluator::new(settings.train_fraction),
            forecaster: Forecaster::new(settings.forecast),
        }
    }

    /// Train, evaluate and forecast for one location without touching disk.
    pub fn run(&self, city: &str, observations: &ObservationTable) -> Result<PipelineOutcome> {
        self.execute(city, observations, None)
    }

    /// Like [`WeatherPipeline::run`], but the artifact, metrics and feature
    /// list are saved before forecasting, and the forecast afterwards when
    /// it succeeds.
    pub fn run_and_persist(
        &self,
        city: &str,
        observations: &ObservationTable,
        store: &ArtifactStore,
    ) -> Result<PipelineOutcome> {
        self.execute(city, observations, Some(store))
    }

    fn execute(
        &self,
        city: &str,
        observations: &ObservationTable,
        store: Option<&ArtifactStore>,
    ) -> Result<PipelineOutcome> {
        let span = info_span!("pipeline", city = %city);
        let _enter = span.enter();

        let (artifact, evaluation) = self.train(observations)?;

        if let Some(store) = store {
            let model_path = store.save_artifact(city, &artifact)?;
            store.save_metrics(city, &evaluation.metrics)?;
            store.save_features(city, artifact.features())?;
            info!(model = %model_path.display(), "model saved");
        }

        let forecast = self.forecaster.forecast(&artifact, observations);
        match &forecast {
            Ok(table) => {
                if let Some(store) = store {
                    let path = store.save_forecast(city, table)?;
                    info!(forecast = %path.display(), "forecast saved");
                }
                info!(days = table.len(), "forecast produced");
            }
            Err(e) => {
                if let Some(store) = store {
                    store.clear_forecast(city)?;
                }
                warn!(error = %e, "forecast refused, trained model kept");
            }
        }

        Ok(PipelineOutcome {
            artifact,
            evaluation,
            forecast,
        })
    }

    /// Assemble, score on the holdout and refit on every row.
    fn train(&self, observations: &ObservationTable) -> Result<(ModelArtifact, Evaluation)> {
        let dataset = self
            .assembler
            .assemble(observations)
            .context("Failed to assemble training set")?;

        let mut model = self.trainer.build_model();
        let evaluation = self
            .evaluator
            .evaluate_then_refit(&mut model, &dataset)
            .context("Holdout evaluation failed")?;

        let artifact = ModelArtifact::new(model, dataset.feature_names)?
            .with_metrics(evaluation.metrics);

        info!(
            family = %artifact.model_type(),
            rows = dataset.targets.len(),
            features = artifact.features().len(),
            mae = evaluation.metrics.mae,
            rmse = evaluation.metrics.rmse,
            "model trained"
        );
        Ok((artifact, evaluation))
    }
}
