//! Subcommand handlers. Every command prints its result as JSON on stdout.

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use medsentinel_core::{find_region, Disease, GroupKey};
use medsentinel_forecast::ForecastRunOptions;
use medsentinel_storage::{seed_cases, SeedOptions};

use crate::cli::{Command, ForecastAction, IngestTarget, MonitorAction};
use crate::state::AppState;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn dispatch(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve { seed } => serve(state, seed).await,
        Command::Ingest { target } => ingest(state, target).await,
        Command::Forecast { action } => forecast(state, action).await,
        Command::Monitor { action } => monitor(state, action).await,
        Command::BackfillWeather { regions, days } => {
            let backfill = match days {
                Some(days) => state.backfill.clone().with_days(days),
                None => state.backfill.clone(),
            };
            let result = backfill.run(regions).await?;
            print_json(&result)
        }
        Command::Seed {
            days,
            no_weather,
            rng_seed,
        } => {
            let summary = seed(state, days, !no_weather, rng_seed).await?;
            print_json(&summary)
        }
    }
}

async fn seed(
    state: &AppState,
    days: u32,
    with_weather: bool,
    rng_seed: Option<u64>,
) -> anyhow::Result<medsentinel_storage::SeedSummary> {
    let opts = SeedOptions {
        days,
        with_weather,
        rng_seed,
        until: None,
    };
    Ok(seed_cases(state.stores.cases.as_ref(), &opts).await?)
}

async fn serve(state: &AppState, with_seed: bool) -> anyhow::Result<()> {
    state.config.log_summary();
    if with_seed {
        seed(state, 30, true, None).await?;
    }

    state.etl.start().context("failed to start ETL scheduler")?;
    state
        .forecasts
        .start()
        .context("failed to start forecast scheduler")?;
    for job in state.etl.jobs().into_iter().chain(state.forecasts.jobs()) {
        info!(job = %job.name, cron = %job.cron, next_run = ?job.next_run, "Scheduled");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");
    state.etl.stop();
    state.forecasts.stop();
    Ok(())
}

async fn ingest(state: &AppState, target: IngestTarget) -> anyhow::Result<()> {
    let result = match target {
        IngestTarget::Disease => state.etl.trigger_disease_data().await?,
        IngestTarget::Weather { regions } => state.etl.trigger_weather_data(regions).await?,
        IngestTarget::Auxiliary => state.etl.trigger_auxiliary_data().await?,
    };
    print_json(&result)
}

async fn forecast(state: &AppState, action: ForecastAction) -> anyhow::Result<()> {
    match action {
        ForecastAction::All { disease, days } => {
            let summary = state
                .forecasts
                .trigger_all_forecasts(ForecastRunOptions {
                    disease,
                    horizon_days: days,
                })
                .await?;
            print_json(&summary)
        }
        ForecastAction::Group {
            region,
            district,
            state: region_state,
            disease,
            days,
        } => {
            let group = resolve_group(region, district, region_state, disease)?;
            let done = state.orchestrator.generate_and_save(&group, days).await?;
            print_json(&serde_json::json!({
                "success": true,
                "savedCount": done.saved_count,
                "group": done.group,
                "forecast": done.response,
            }))
        }
        ForecastAction::Regions { disease } => {
            let groups = state.orchestrator.available_regions(disease).await?;
            print_json(&groups)
        }
        ForecastAction::Health => {
            let healthy = state.orchestrator.check_health().await;
            print_json(&serde_json::json!({
                "service": state.config.forecast.service_url,
                "healthy": healthy,
            }))
        }
    }
}

/// Fill district and state from the city registry when not given.
fn resolve_group(
    region: String,
    district: Option<String>,
    state: Option<String>,
    disease: Disease,
) -> anyhow::Result<GroupKey> {
    let known = find_region(&region);
    let district = district
        .or_else(|| known.map(|k| k.district.to_string()))
        .unwrap_or_else(|| region.clone());
    let state = match state.or_else(|| known.map(|k| k.state.to_string())) {
        Some(state) => state,
        None => bail!("unknown region '{region}': pass --state explicitly"),
    };
    Ok(GroupKey {
        region: known.map_or(region, |k| k.region.to_string()),
        district,
        state,
        disease,
    })
}

async fn monitor(state: &AppState, action: MonitorAction) -> anyhow::Result<()> {
    match action {
        MonitorAction::Freshness => print_json(&state.monitor.data_freshness().await?),
        MonitorAction::Quality => print_json(&state.monitor.data_quality().await?),
        MonitorAction::Health => print_json(&state.monitor.check_data_health().await?),
        MonitorAction::Jobs { limit } => print_json(&serde_json::json!({
            "statistics": state.monitor.job_statistics(),
            "history": state.monitor.job_history(limit),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_defaults_from_registry() {
        let group = resolve_group("delhi".into(), None, None, Disease::Dengue).unwrap();
        assert_eq!(group.district, "New Delhi");
        assert_eq!(group.state, "Delhi");
        assert_eq!(group.region, "Delhi");
    }

    #[test]
    fn unknown_region_needs_state() {
        assert!(resolve_group("Atlantis".into(), None, None, Disease::Flu).is_err());
        let group =
            resolve_group("Atlantis".into(), None, Some("Sea".into()), Disease::Flu).unwrap();
        assert_eq!(group.district, "Atlantis");
    }
}
