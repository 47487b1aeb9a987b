use anyhow::{Context, Result};
use meteo_forecast::{config, pipeline, store, telemetry, transform};
use config::Config;
use meteo_forecast::ml::ModelFamily;
use pipeline::{PipelineSettings, WeatherPipeline};
use std::sync::Arc;
use store::ArtifactStore;
use meteo_forecast::summary::WeatherSummary;
use telemetry::init_tracing;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load().context("Failed to load configuration")?;
    cfg.validate().map_err(anyhow::Error::msg)?;

    let family = ModelFamily::resolve(cfg.model.family);
    info!(%family, locations = cfg.locations.len(), "starting forecast run");

    let pipeline = Arc::new(WeatherPipeline::new(PipelineSettings::from_config(&cfg, family)));
    let store = ArtifactStore::new(cfg.data.root_dir.clone());

    let mut tasks = JoinSet::new();
    for location in cfg.locations.clone() {
        let pipeline = Arc::clone(&pipeline);
        let store = store.clone();
        tasks.spawn_blocking(move || {
            let result = run_location(&pipeline, &store, &location.name);
            (location.name, result)
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((city, Ok(()))) => info!(%city, "location done"),
            Ok((city, Err(e))) => {
                failed += 1;
                error!(%city, error = format!("{e:#}"), "location failed");
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "location task panicked");
            }
        }
    }

    if failed > 0 {
        warn!(failed, total = cfg.locations.len(), "run finished with failures");
    } else {
        info!(total = cfg.locations.len(), "run finished");
    }
    Ok(())
}

/// Cleaned table when present, otherwise clean (and save) the raw download.
/// A refused forecast is logged; the saved model still counts as done.
fn run_location(pipeline: &WeatherPipeline, store: &ArtifactStore, city: &str) -> Result<()> {
    let paths = store.location(city);
    let observations = if paths.processed_csv().exists() {
        store.load_processed(city)?
    } else {
        let raw = store.load_raw(city)?;
        let clean = transform::clean_observations(&raw)
            .with_context(|| format!("Failed to clean raw data for {city}"))?;
        store.save_processed(city, &clean)?;
        clean
    };

    let summary = WeatherSummary::from_table(&observations)
        .with_context(|| format!("Failed to summarise observations for {city}"))?;
    store.save_weather_summary(city, &summary)?;

    let outcome = pipeline.run_and_persist(city, &observations, store)?;
    if let Err(e) = &outcome.forecast {
        warn!(%city, error = %e, "no forecast written");
    }
    Ok(())
}
